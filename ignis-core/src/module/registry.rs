//! Built module instances, indexed by identity.

use super::{ModuleDefinition, ModuleOutputs};
use crate::error::{IgnisError, Result};
use crate::types::{ActionId, ModuleId};
use std::collections::HashMap;

/// One built module instance.
#[derive(Debug, Clone)]
pub struct BuiltModule {
    /// The instance identity.
    pub id: ModuleId,
    /// Its exposed outputs.
    pub outputs: ModuleOutputs,
    /// The actions it declared itself, excluding those of used modules.
    pub actions: Vec<ActionId>,
}

/// Arena of built modules with an identity index.
///
/// A module instance is built at most once per graph; later uses with the
/// same identity receive the stored outputs.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    built: Vec<BuiltModule>,
    index: HashMap<ModuleId, usize>,
    definitions: HashMap<String, ModuleDefinition>,
    in_progress: Vec<String>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the definition behind a module name.
    ///
    /// A name maps to exactly one definition per graph.
    pub fn check_definition(&mut self, definition: &ModuleDefinition) -> Result<()> {
        match self.definitions.get(definition.name()) {
            Some(existing) if !existing.same_definition(definition) => Err(IgnisError::DuplicateId {
                id: definition.name().to_string(),
                module: self
                    .in_progress
                    .last()
                    .cloned()
                    .unwrap_or_else(|| definition.name().to_string()),
                hint: "two different module definitions share this name".to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.definitions
                    .insert(definition.name().to_string(), definition.clone());
                Ok(())
            }
        }
    }

    /// Look up a built instance.
    pub fn get(&self, id: &ModuleId) -> Option<&BuiltModule> {
        self.index.get(id).map(|&i| &self.built[i])
    }

    /// Mark a module as being built; fails if it is already on the build stack.
    pub fn enter(&mut self, name: &str) -> Result<()> {
        if self.in_progress.iter().any(|n| n == name) {
            let mut path = self.in_progress.clone();
            path.push(name.to_string());
            return Err(IgnisError::ModuleCycle {
                module: name.to_string(),
                path: path.join(" -> "),
            });
        }
        self.in_progress.push(name.to_string());
        Ok(())
    }

    /// Pop the module being built.
    pub fn leave(&mut self) {
        self.in_progress.pop();
    }

    /// Store a finished instance.
    pub fn insert(&mut self, module: BuiltModule) {
        self.index.insert(module.id.clone(), self.built.len());
        self.built.push(module);
    }

    /// Built instances in completion order: used modules before their users.
    pub fn modules(&self) -> impl Iterator<Item = &BuiltModule> {
        self.built.iter()
    }

    /// Number of built instances.
    pub fn len(&self) -> usize {
        self.built.len()
    }

    /// Whether nothing has been built.
    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(name: &str) -> ModuleDefinition {
        ModuleDefinition::new(name, |_| Ok(ModuleOutputs::new()))
    }

    #[test]
    fn same_name_different_definition_conflicts() {
        let mut registry = ModuleRegistry::new();
        let a = empty("Token");
        registry.check_definition(&a).unwrap();
        registry.check_definition(&a.clone()).unwrap();

        let err = registry.check_definition(&empty("Token")).unwrap_err();
        assert!(matches!(err, IgnisError::DuplicateId { .. }));
    }

    #[test]
    fn reentering_reports_path() {
        let mut registry = ModuleRegistry::new();
        registry.enter("A").unwrap();
        registry.enter("B").unwrap();
        match registry.enter("A") {
            Err(IgnisError::ModuleCycle { path, .. }) => assert_eq!(path, "A -> B -> A"),
            other => panic!("expected module cycle, got {:?}", other),
        }
    }
}
