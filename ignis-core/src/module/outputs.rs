use crate::error::{IgnisError, Result};
use crate::future::FutureRef;
use crate::types::ModuleId;

/// The named futures a module exposes to its consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleOutputs {
    module: Option<ModuleId>,
    entries: Vec<(String, FutureRef)>,
}

impl ModuleOutputs {
    /// Create an empty output set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output, builder style. A repeated name replaces the earlier entry.
    pub fn with(mut self, name: impl Into<String>, future: &FutureRef) -> Self {
        self.insert(name, future.clone());
        self
    }

    /// Add an output. A repeated name replaces the earlier entry.
    pub fn insert(&mut self, name: impl Into<String>, future: FutureRef) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = future,
            None => self.entries.push((name, future)),
        }
    }

    /// Look up an output.
    pub fn get(&self, name: &str) -> Option<&FutureRef> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, future)| future)
    }

    /// Look up an output that must exist.
    pub fn require(&self, name: &str) -> Result<FutureRef> {
        self.get(name)
            .cloned()
            .ok_or_else(|| IgnisError::UnresolvedReference {
                reference: name.to_string(),
                module: self
                    .module
                    .as_ref()
                    .map_or_else(|| "<unbuilt>".to_string(), ToString::to_string),
                cause: format!(
                    "module exposes no such output (available: {})",
                    self.names().collect::<Vec<_>>().join(", ")
                ),
            })
    }

    /// The module instance that produced these outputs, once built.
    pub fn module(&self) -> Option<&ModuleId> {
        self.module.as_ref()
    }

    pub(crate) fn set_module(&mut self, module: ModuleId) {
        self.module = Some(module);
    }

    /// Output names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Outputs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FutureRef)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no outputs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
