//! Strongly-typed identifiers for deployment entities.
//!
//! Action and future identifiers are content-derived: they are built from the
//! module identity and the local binding name, so rebuilding the same module
//! definition with the same parameters always yields the same identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Separator between the module identity and the local name.
const LOCAL_SEPARATOR: char = '#';

/// Unique identifier for a single invocation of the executor.
///
/// Run ids are random. They correlate journal records and log lines of one
/// process lifetime; they never participate in action identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a run ID from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse a run ID from its UUID string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run_{}", self.0)
    }
}

/// Identity of a built module instance.
///
/// Two `use_module` calls share one instance exactly when their module name
/// and parameter hash are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    name: String,
    parameter_hash: Option<String>,
}

impl ModuleId {
    /// Create a module identity.
    ///
    /// `parameter_hash` is `None` for modules bound without parameters, which
    /// keeps their action ids in the plain `Module#local` form.
    #[must_use]
    pub fn new(name: impl Into<String>, parameter_hash: Option<String>) -> Self {
        Self {
            name: name.into(),
            parameter_hash,
        }
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The short parameter hash, if the module was bound with parameters.
    #[must_use]
    pub fn parameter_hash(&self) -> Option<&str> {
        self.parameter_hash.as_deref()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameter_hash {
            Some(hash) => write!(f, "{}[{}]", self.name, hash),
            None => f.write_str(&self.name),
        }
    }
}

/// Stable identifier of an action node: `Module#local` or `Module[hash]#local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Derive the action id for a local binding inside a module.
    #[must_use]
    pub fn new(module: &ModuleId, local_name: &str) -> Self {
        Self(format!("{}{}{}", module, LOCAL_SEPARATOR, local_name))
    }

    /// Wrap an already-formatted id (e.g. read back from the journal).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The local binding name (the part after `#`).
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.0
            .rsplit_once(LOCAL_SEPARATOR)
            .map_or(self.0.as_str(), |(_, local)| local)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a future value.
///
/// A future produced by an action shares that action's id string. Pre-resolved
/// futures (accounts, parameters) get their own names inside the module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FutureId(String);

impl FutureId {
    /// Derive a future id for a local name inside a module.
    #[must_use]
    pub fn new(module: &ModuleId, local_name: &str) -> Self {
        Self(format!("{}{}{}", module, LOCAL_SEPARATOR, local_name))
    }

    /// The future produced by the given action.
    #[must_use]
    pub fn for_action(action: &ActionId) -> Self {
        Self(action.as_str().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_id_is_content_derived() {
        let module = ModuleId::new("ProxyModule", None);
        let a = ActionId::new(&module, "Box");
        let b = ActionId::new(&ModuleId::new("ProxyModule", None), "Box");

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "ProxyModule#Box");
        assert_eq!(a.local_name(), "Box");
    }

    #[test]
    fn parameter_hash_is_part_of_identity() {
        let plain = ModuleId::new("TokenModule", None);
        let bound = ModuleId::new("TokenModule", Some("a1b2c3d4e5f60718".to_string()));

        assert_ne!(ActionId::new(&plain, "Token"), ActionId::new(&bound, "Token"));
        assert_eq!(
            ActionId::new(&bound, "Token").as_str(),
            "TokenModule[a1b2c3d4e5f60718]#Token"
        );
    }

    #[test]
    fn future_of_action_shares_its_id() {
        let action = ActionId::new(&ModuleId::new("M", None), "Token.mint");
        assert_eq!(FutureId::for_action(&action).as_str(), action.as_str());
    }

    #[test]
    fn run_id_display() {
        let id = RunId::new();
        assert!(id.to_string().starts_with("run_"));
        assert_eq!(RunId::parse(&id.as_uuid().to_string()), Some(id));
    }
}
