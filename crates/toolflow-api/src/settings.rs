//! Provider selection and construction.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use toolflow_types::{ApiError, ConfigError, Provider};

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;
use crate::retry::RetryConfig;

/// Default completion budget per provider round.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// The supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-5-20250929",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::OpenAi => "gpt-4o",
        }
    }

    /// Public API endpoint root.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::OpenAi => "https://api.openai.com",
        }
    }

    /// Environment variables consulted for the API key, in order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderKind::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
        }
    }

    fn available() -> String {
        Self::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            _ => Err(ConfigError::UnknownProvider {
                name: s.to_string(),
                available: Self::available(),
            }),
        }
    }
}

/// Model parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl ModelParams {
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            model: kind.default_model().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }
}

/// Everything needed to construct one provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub params: ModelParams,
    pub retry: RetryConfig,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            params: ModelParams::for_kind(kind),
            retry: RetryConfig::default(),
        }
    }
}

/// Build the provider for `kind` behind the common trait.
pub fn build_provider(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> Result<Arc<dyn Provider>, ApiError> {
    let base_url = settings
        .base_url
        .clone()
        .unwrap_or_else(|| kind.default_base_url().to_string());
    let api_key = settings.api_key.clone();
    let params = settings.params.clone();

    tracing::debug!(provider = %kind, model = %params.model, "building provider");

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Anthropic => Arc::new(
            AnthropicProvider::new(api_key, base_url, params)?
                .with_retry_config(settings.retry.clone()),
        ),
        ProviderKind::Gemini => Arc::new(
            GeminiProvider::new(api_key, base_url, params)?
                .with_retry_config(settings.retry.clone()),
        ),
        ProviderKind::OpenAi => Arc::new(
            OpenAiProvider::new(api_key, base_url, params)?
                .with_retry_config(settings.retry.clone()),
        ),
    };
    Ok(provider)
}
