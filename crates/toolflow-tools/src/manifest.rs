//! The set of tools offered to the model for one turn.

use std::collections::HashMap;

use toolflow_types::{ConfigError, ToolDescriptor, ToolSource};

/// Ordered tool descriptors plus the name → source map, fixed at build time.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    tools: Vec<ToolDescriptor>,
    sources: HashMap<String, ToolSource>,
    used_filtering: bool,
}

impl Manifest {
    pub fn builder() -> ManifestBuilder {
        ManifestBuilder::default()
    }

    /// Descriptors in registration order: remote tools, then custom tools.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn source(&self, name: &str) -> Option<ToolSource> {
        self.sources.get(name).copied()
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn has_source(&self, source: ToolSource) -> bool {
        self.sources.values().any(|s| *s == source)
    }

    /// Names of the tools from `source`, in manifest order.
    pub fn names_from(&self, source: ToolSource) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|t| self.sources.get(&t.name) == Some(&source))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Whether the remote tools were narrowed by relevance filtering.
    pub fn used_filtering(&self) -> bool {
        self.used_filtering
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Collects remote and custom tools, rejecting duplicate names.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    entries: Vec<(ToolDescriptor, ToolSource)>,
    used_filtering: bool,
}

impl ManifestBuilder {
    pub fn remote(mut self, tools: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        self.entries
            .extend(tools.into_iter().map(|t| (t, ToolSource::Remote)));
        self
    }

    pub fn custom(mut self, tools: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        self.entries
            .extend(tools.into_iter().map(|t| (t, ToolSource::Custom)));
        self
    }

    pub fn filtered(mut self, used_filtering: bool) -> Self {
        self.used_filtering = used_filtering;
        self
    }

    pub fn build(self) -> Result<Manifest, ConfigError> {
        let mut tools = Vec::with_capacity(self.entries.len());
        let mut sources = HashMap::with_capacity(self.entries.len());

        for (tool, source) in self.entries {
            if sources.insert(tool.name.clone(), source).is_some() {
                return Err(ConfigError::DuplicateTool { name: tool.name });
            }
            tools.push(tool);
        }

        Ok(Manifest {
            tools,
            sources,
            used_filtering: self.used_filtering,
        })
    }
}
