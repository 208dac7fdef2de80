use super::{ModuleBuilder, ModuleOutputs};
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// The callback that declares a module's actions.
pub type BuildFn = dyn Fn(&mut ModuleBuilder<'_>) -> Result<ModuleOutputs> + Send + Sync;

/// A named, reusable module definition.
///
/// Cloning is cheap and clones share identity: two clones of one definition
/// are the same module, while two separately constructed definitions with
/// the same name are a conflict.
#[derive(Clone)]
pub struct ModuleDefinition {
    name: String,
    build: Arc<BuildFn>,
}

impl ModuleDefinition {
    /// Create a module definition.
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&mut ModuleBuilder<'_>) -> Result<ModuleOutputs> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `other` is a clone of this definition.
    pub fn same_definition(&self, other: &ModuleDefinition) -> bool {
        Arc::ptr_eq(&self.build, &other.build)
    }

    pub(crate) fn invoke(&self, builder: &mut ModuleBuilder<'_>) -> Result<ModuleOutputs> {
        (self.build)(builder)
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
