//! Layered TOML configuration for toolflow.
//!
//! Reads configuration from multiple sources with precedence:
//! explicit overrides > env vars > config file > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toolflow_api::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ModelParams, ProviderKind, ProviderSettings,
    RetryConfig,
};
use toolflow_mcp::{McpServerConfig, resolve_observee};
use toolflow_tools::FilterOptions;
use toolflow_types::ConfigError;

/// Provider rounds allowed per turn before it is abandoned.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Resolved configuration for toolflow turns.
#[derive(Debug, Clone)]
pub struct ToolflowConfig {
    /// Provider used when a request does not name one.
    pub provider: ProviderKind,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
    pub max_rounds: usize,
    pub max_retries: Option<u32>,
    pub filter: FilterSettings,
    /// Remote MCP tool service, if one is configured.
    pub observee: Option<McpServerConfig>,
    pub config_dir: PathBuf,
    anthropic: ProviderEntry,
    gemini: ProviderEntry,
    openai: ProviderEntry,
}

/// Relevance filtering of remote tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_tools")]
    pub max_tools: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_tools() -> usize {
    FilterOptions::default().max_tools
}

fn default_min_score() -> f64 {
    FilterOptions::default().min_score
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tools: default_max_tools(),
            min_score: default_min_score(),
        }
    }
}

impl FilterSettings {
    /// Filter options when filtering is enabled.
    pub fn options(&self) -> Option<FilterOptions> {
        self.enabled.then(|| FilterOptions {
            max_tools: self.max_tools,
            min_score: self.min_score,
        })
    }
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub observee: ObserveeSection,
    #[serde(default)]
    pub filter: Option<FilterSettings>,
    pub max_rounds: Option<usize>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    pub default: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub anthropic: ProviderEntry,
    #[serde(default)]
    pub gemini: ProviderEntry,
    #[serde(default)]
    pub openai: ProviderEntry,
}

/// Per-provider credentials and endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObserveeSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub server_name: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Explicit values that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Key for the selected provider.
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
    pub max_rounds: Option<usize>,
    pub enable_filtering: Option<bool>,
    pub observee_url: Option<String>,
    pub observee_api_key: Option<String>,
    pub client_id: Option<String>,
}

impl ToolflowConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit overrides
    /// 2. Environment variables
    /// 3. Config file (~/.toolflow/config.toml)
    /// 4. Defaults
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));
        let mut config = Self::resolve(overrides, settings, |k| std::env::var(k).ok())?;
        config.config_dir = config_dir;
        Ok(config)
    }

    /// Resolve from an already-parsed file and an environment lookup.
    pub fn resolve(
        overrides: ConfigOverrides,
        settings: SettingsFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

        let provider: ProviderKind = overrides
            .provider
            .or_else(|| non_empty("TOOLFLOW_PROVIDER"))
            .or(settings.provider.default)
            .map(|name| name.parse())
            .transpose()?
            .unwrap_or(ProviderKind::Anthropic);

        let mut providers = [
            settings.provider.anthropic,
            settings.provider.gemini,
            settings.provider.openai,
        ];
        for (kind, entry) in ProviderKind::ALL.iter().zip(providers.iter_mut()) {
            if let Some(key) = kind.api_key_env_vars().iter().find_map(|var| non_empty(*var)) {
                entry.api_key = Some(key);
            }
        }
        let [mut anthropic, mut gemini, mut openai] = providers;
        let selected = match provider {
            ProviderKind::Anthropic => &mut anthropic,
            ProviderKind::Gemini => &mut gemini,
            ProviderKind::OpenAi => &mut openai,
        };
        if let Some(model) = overrides.model.or_else(|| non_empty("TOOLFLOW_MODEL")) {
            selected.model = Some(model);
        }
        if let Some(key) = overrides.api_key {
            selected.api_key = Some(key);
        }

        let max_rounds = overrides
            .max_rounds
            .or(settings.max_rounds)
            .unwrap_or(DEFAULT_MAX_ROUNDS);
        if max_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_rounds".into(),
                message: "must be at least 1".into(),
            });
        }

        let temperature = overrides
            .temperature
            .or(settings.provider.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "temperature".into(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        let mut filter = settings.filter.unwrap_or_default();
        if let Some(enabled) = overrides.enable_filtering {
            filter.enabled = enabled;
        }
        if filter.max_tools == 0 {
            return Err(ConfigError::InvalidValue {
                key: "filter.max_tools".into(),
                message: "must be at least 1".into(),
            });
        }
        if !filter.min_score.is_finite() || filter.min_score < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "filter.min_score".into(),
                message: format!("{} is not a finite, non-negative score", filter.min_score),
            });
        }

        let observee = resolve_observee_layers(
            &overrides.observee_url,
            &overrides.observee_api_key,
            overrides.client_id,
            settings.observee,
            &non_empty,
        )?;

        Ok(ToolflowConfig {
            provider,
            max_tokens: overrides
                .max_tokens
                .or(settings.provider.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: Some(temperature),
            system_prompt: overrides.system_prompt.or(settings.system_prompt),
            max_rounds,
            max_retries: settings.provider.max_retries,
            filter,
            observee,
            config_dir: PathBuf::new(),
            anthropic,
            gemini,
            openai,
        })
    }

    /// Settings for `kind`, failing when its API key is missing.
    pub fn provider_settings(&self, kind: ProviderKind) -> Result<ProviderSettings, ConfigError> {
        let entry = self.entry(kind);
        let api_key = entry.api_key.clone().ok_or_else(|| ConfigError::MissingKey {
            key: format!(
                "{} api_key (set {} or add [provider.{}] to ~/.toolflow/config.toml)",
                kind,
                kind.api_key_env_vars().join(" or "),
                kind
            ),
        })?;

        let mut retry = RetryConfig::default();
        if let Some(max_retries) = self.max_retries {
            retry.max_retries = max_retries;
        }

        Ok(ProviderSettings {
            api_key,
            base_url: entry.base_url.clone(),
            params: ModelParams {
                model: entry
                    .model
                    .clone()
                    .unwrap_or_else(|| kind.default_model().to_string()),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            },
            retry,
        })
    }

    fn entry(&self, kind: ProviderKind) -> &ProviderEntry {
        match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
        }
    }
}

/// Observee service: explicit values, then the environment, then the file.
/// The client id follows the same order and applies to every layer.
fn resolve_observee_layers(
    url: &Option<String>,
    api_key: &Option<String>,
    client_id: Option<String>,
    file: ObserveeSection,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Option<McpServerConfig>, ConfigError> {
    let client_id = client_id
        .or_else(|| env("OBSERVEE_CLIENT_ID"))
        .or(file.client_id);

    let resolved = match resolve_observee(url.as_deref(), api_key.as_deref(), client_id.as_deref(), env)? {
        Some(config) => Some(config),
        None => resolve_observee(
            file.url.as_deref(),
            file.api_key.as_deref(),
            client_id.as_deref(),
            |_| None,
        )?,
    };

    Ok(resolved.map(|mut config| {
        if let Some(name) = file.server_name {
            config.server_name = name;
        }
        if let Some(timeout_ms) = file.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        config
    }))
}

/// Get the toolflow config directory path (~/.toolflow/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TOOLFLOW_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolflow")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}
