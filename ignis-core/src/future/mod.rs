//! Future values.
//!
//! A future is a placeholder for a value that exists only after its
//! producing action confirms: a deployed address, an event argument, an
//! encoded call. Futures are defined once when the graph is built and
//! resolved exactly once during execution. Accounts and module parameters
//! are defined pre-resolved.
//!
//! Waiting on a future is not a control-flow construct. The scheduler asks
//! the [`FutureTable`] whether every input of an action is resolved and
//! only then treats the action as ready.

mod argument;
mod table;

pub use argument::Argument;
pub use table::FutureTable;

use crate::error::{IgnisError, Result};
use crate::types::{ActionId, FutureId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of value a future stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FutureKind {
    /// A contract instance; resolves to its address.
    ContractHandle,
    /// A plain account or contract address.
    Address,
    /// An argument read from an emitted event.
    EventArgument,
    /// ABI-encoded call data.
    EncodedCall,
    /// Any other value (call results, module parameters).
    RawValue,
}

impl FutureKind {
    /// Kind name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContractHandle => "contract handle",
            Self::Address => "address",
            Self::EventArgument => "event argument",
            Self::EncodedCall => "encoded call",
            Self::RawValue => "raw value",
        }
    }

    /// Whether a value of this kind may be used where an address is expected.
    pub fn is_address_like(&self) -> bool {
        !matches!(self, Self::EncodedCall)
    }
}

impl fmt::Display for FutureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed placeholder for a value that may not be known yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Future {
    id: FutureId,
    kind: FutureKind,
    producer: Option<ActionId>,
    contract: Option<String>,
    value: Option<Value>,
}

impl Future {
    /// Define an unresolved future produced by an action.
    pub fn define(id: FutureId, kind: FutureKind, producer: ActionId) -> Self {
        Self {
            id,
            kind,
            producer: Some(producer),
            contract: None,
            value: None,
        }
    }

    /// Define a future whose value is already known (accounts, parameters, constants).
    pub fn resolved(id: FutureId, kind: FutureKind, value: Value) -> Self {
        Self {
            id,
            kind,
            producer: None,
            contract: None,
            value: Some(value),
        }
    }

    /// Attach the contract name a handle refers to.
    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    /// The future id.
    pub fn id(&self) -> &FutureId {
        &self.id
    }

    /// The future kind.
    pub fn kind(&self) -> FutureKind {
        self.kind
    }

    /// The action that produces this future, if any.
    pub fn producer(&self) -> Option<&ActionId> {
        self.producer.as_ref()
    }

    /// The contract name behind a contract handle.
    pub fn contract(&self) -> Option<&str> {
        self.contract.as_deref()
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Whether the value is known.
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Resolve the future. A resolved future never changes again.
    pub fn resolve(&mut self, value: Value) -> Result<()> {
        if self.value.is_some() {
            return Err(IgnisError::DoubleResolution {
                future_id: self.id.clone(),
            });
        }
        self.value = Some(value);
        Ok(())
    }
}

/// A lightweight handle to a future, handed out by the module builder.
///
/// Handles are what module definitions pass around and expose as outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FutureRef {
    id: FutureId,
    kind: FutureKind,
}

impl FutureRef {
    /// Create a handle.
    pub fn new(id: FutureId, kind: FutureKind) -> Self {
        Self { id, kind }
    }

    /// The referenced future id.
    pub fn id(&self) -> &FutureId {
        &self.id
    }

    /// The referenced future kind.
    pub fn kind(&self) -> FutureKind {
        self.kind
    }
}

impl From<&Future> for FutureRef {
    fn from(future: &Future) -> Self {
        Self::new(future.id.clone(), future.kind)
    }
}
