//! The set of futures of one deployment graph.

use super::{Argument, Future};
use crate::error::{IgnisError, Result};
use crate::types::FutureId;
use crate::value::Value;
use std::collections::BTreeMap;

/// All futures of a graph, keyed by id.
///
/// The graph keeps the definitions; the executor clones the table and
/// resolves futures on its copy as actions confirm.
#[derive(Debug, Clone, Default)]
pub struct FutureTable {
    futures: BTreeMap<FutureId, Future>,
}

impl FutureTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a future definition. Returns `false` if the id is already taken.
    pub fn insert(&mut self, future: Future) -> bool {
        if self.futures.contains_key(future.id()) {
            return false;
        }
        self.futures.insert(future.id().clone(), future);
        true
    }

    /// Look up a future.
    pub fn get(&self, id: &FutureId) -> Option<&Future> {
        self.futures.get(id)
    }

    /// Whether the table defines the future.
    pub fn contains(&self, id: &FutureId) -> bool {
        self.futures.contains_key(id)
    }

    /// Iterate over all futures in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Future> {
        self.futures.values()
    }

    /// Number of futures.
    pub fn len(&self) -> usize {
        self.futures.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }

    /// Resolve a future to its value.
    pub fn resolve(&mut self, id: &FutureId, value: Value) -> Result<()> {
        let future = self
            .futures
            .get_mut(id)
            .ok_or_else(|| IgnisError::FutureUnresolved {
                future_id: id.clone(),
            })?;
        future.resolve(value)
    }

    /// Whether the future is known and resolved.
    pub fn is_resolved(&self, id: &FutureId) -> bool {
        self.futures.get(id).is_some_and(Future::is_resolved)
    }

    /// Readiness predicate: every listed future is resolved.
    pub fn all_resolved<'a>(&self, ids: impl IntoIterator<Item = &'a FutureId>) -> bool {
        ids.into_iter().all(|id| self.is_resolved(id))
    }

    /// The resolved value of a future.
    pub fn value(&self, id: &FutureId) -> Result<&Value> {
        self.futures
            .get(id)
            .and_then(Future::value)
            .ok_or_else(|| IgnisError::FutureUnresolved {
                future_id: id.clone(),
            })
    }

    /// Substitute resolved values into an argument.
    pub fn resolve_argument(&self, argument: &Argument) -> Result<Value> {
        match argument {
            Argument::Future(id) => self.value(id).cloned(),
            Argument::Literal(value) => Ok(value.clone()),
            Argument::List(items) => items
                .iter()
                .map(|item| self.resolve_argument(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::list),
        }
    }

    /// Substitute resolved values into an argument list.
    pub fn resolve_arguments(&self, arguments: &[Argument]) -> Result<Vec<Value>> {
        arguments
            .iter()
            .map(|arg| self.resolve_argument(arg))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::FutureKind;
    use crate::types::{ActionId, ModuleId};

    fn table() -> (FutureTable, FutureId, FutureId) {
        let module = ModuleId::new("ProxyModule", None);
        let owner = FutureId::new(&module, "accounts.0");
        let action = ActionId::new(&module, "Box");
        let boxed = FutureId::for_action(&action);

        let mut table = FutureTable::new();
        assert!(table.insert(Future::resolved(
            owner.clone(),
            FutureKind::Address,
            Value::string("0xowner"),
        )));
        assert!(table.insert(Future::define(
            boxed.clone(),
            FutureKind::ContractHandle,
            action,
        )));
        (table, owner, boxed)
    }

    #[test]
    fn readiness_tracks_resolution() {
        let (mut table, owner, boxed) = table();

        assert!(table.all_resolved([&owner]));
        assert!(!table.all_resolved([&owner, &boxed]));

        table.resolve(&boxed, Value::string("0xbox")).unwrap();
        assert!(table.all_resolved([&owner, &boxed]));
    }

    #[test]
    fn resolving_unresolved_argument_fails() {
        let (table, owner, boxed) = table();
        let args = vec![
            Argument::Future(boxed),
            Argument::Future(owner),
            Argument::from("0x"),
        ];
        let err = table.resolve_arguments(&args).unwrap_err();
        assert!(matches!(err, IgnisError::FutureUnresolved { .. }));
    }

    #[test]
    fn list_arguments_resolve_to_arrays() {
        let (mut table, owner, boxed) = table();
        table.resolve(&boxed, Value::string("0xbox")).unwrap();

        let arg = Argument::List(vec![Argument::Future(boxed), Argument::Future(owner)]);
        let value = table.resolve_argument(&arg).unwrap();
        assert_eq!(value.0, serde_json::json!(["0xbox", "0xowner"]));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (mut table, owner, _) = table();
        assert!(!table.insert(Future::resolved(owner, FutureKind::Address, Value::null())));
        assert_eq!(table.len(), 2);
    }
}
