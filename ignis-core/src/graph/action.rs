//! Action nodes: one deployment or contract-interaction step each.

use crate::future::{Argument, FutureKind};
use crate::types::{ActionId, FutureId, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The kind of step an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Deploy a new contract.
    Deploy,
    /// Invoke a method on a deployed contract.
    Call,
    /// Extract an argument from an event in a confirmed receipt.
    ReadEventArgument,
    /// Bind a contract handle to an existing address.
    BindExisting,
    /// ABI-encode a method call without sending it.
    EncodeCall,
}

impl ActionKind {
    /// Kind name for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Call => "call",
            Self::ReadEventArgument => "read_event_argument",
            Self::BindExisting => "bind_existing",
            Self::EncodeCall => "encode_call",
        }
    }

    /// Whether executing the action broadcasts a transaction.
    pub fn submits_transaction(&self) -> bool {
        matches!(self, Self::Deploy | Self::Call)
    }

    /// The kind of future the action produces.
    pub fn output_kind(&self) -> FutureKind {
        match self {
            Self::Deploy | Self::BindExisting => FutureKind::ContractHandle,
            Self::Call => FutureKind::RawValue,
            Self::ReadEventArgument => FutureKind::EventArgument,
            Self::EncodeCall => FutureKind::EncodedCall,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of an action within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Waiting on unresolved inputs.
    Pending,
    /// All inputs resolved; eligible for dispatch.
    Ready,
    /// Broadcast; waiting for confirmation.
    Submitted,
    /// Confirmed; result recorded.
    Confirmed,
    /// Failed; dependents are blocked.
    Failed,
}

impl ActionStatus {
    /// Status name for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Whether the status is final for the current run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Allowed transitions: Pending → Ready → Submitted → Confirmed, and any
    /// non-confirmed status → Failed.
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Ready, Submitted)
                | (Ready, Confirmed)
                | (Submitted, Confirmed)
                | (Pending | Ready | Submitted, Failed)
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an action does, with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOperation {
    /// Deploy `contract` with constructor arguments.
    Deploy {
        /// Contract (artifact) name.
        contract: String,
        /// Constructor arguments.
        args: Vec<Argument>,
        /// Native amount sent with the deployment.
        value: Option<Argument>,
        /// Sender; the default account when absent.
        from: Option<Argument>,
    },
    /// Call `method` on a contract handle.
    Call {
        /// The target contract handle.
        contract: FutureId,
        /// Method name.
        method: String,
        /// Call arguments.
        args: Vec<Argument>,
        /// Native amount sent with the call.
        value: Option<Argument>,
        /// Sender; the default account when absent.
        from: Option<Argument>,
    },
    /// Read `argument` of the `index`-th `event` in the receipt of `source`.
    ReadEventArgument {
        /// The deploy or call whose receipt holds the event.
        source: FutureId,
        /// The contract that emitted the event; defaults to the source contract.
        emitter: Option<FutureId>,
        /// Event name.
        event: String,
        /// Argument name.
        argument: String,
        /// Which matching event to read when several were emitted.
        index: usize,
    },
    /// Treat `address` as an instance of `contract`.
    BindExisting {
        /// Contract (artifact) name.
        contract: String,
        /// The address to bind.
        address: Argument,
    },
    /// Encode a call to `method` on a contract handle.
    EncodeCall {
        /// The target contract handle.
        contract: FutureId,
        /// Method name.
        method: String,
        /// Call arguments.
        args: Vec<Argument>,
    },
}

impl ActionOperation {
    /// The action kind.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Deploy { .. } => ActionKind::Deploy,
            Self::Call { .. } => ActionKind::Call,
            Self::ReadEventArgument { .. } => ActionKind::ReadEventArgument,
            Self::BindExisting { .. } => ActionKind::BindExisting,
            Self::EncodeCall { .. } => ActionKind::EncodeCall,
        }
    }

    /// The contract name for artifact-addressed operations.
    pub fn contract_name(&self) -> Option<&str> {
        match self {
            Self::Deploy { contract, .. } | Self::BindExisting { contract, .. } => Some(contract),
            _ => None,
        }
    }

    /// The explicit sender, if any.
    pub fn sender(&self) -> Option<&Argument> {
        match self {
            Self::Deploy { from, .. } | Self::Call { from, .. } => from.as_ref(),
            _ => None,
        }
    }

    /// Every future this operation reads, in order of appearance.
    pub fn inputs(&self) -> Vec<&FutureId> {
        let mut out = Vec::new();
        match self {
            Self::Deploy {
                args, value, from, ..
            } => {
                out.extend(args.iter().flat_map(Argument::futures));
                out.extend(value.iter().flat_map(Argument::futures));
                out.extend(from.iter().flat_map(Argument::futures));
            }
            Self::Call {
                contract,
                args,
                value,
                from,
                ..
            } => {
                out.push(contract);
                out.extend(args.iter().flat_map(Argument::futures));
                out.extend(value.iter().flat_map(Argument::futures));
                out.extend(from.iter().flat_map(Argument::futures));
            }
            Self::ReadEventArgument {
                source, emitter, ..
            } => {
                out.push(source);
                out.extend(emitter.iter());
            }
            Self::BindExisting { address, .. } => out.extend(address.futures()),
            Self::EncodeCall { contract, args, .. } => {
                out.push(contract);
                out.extend(args.iter().flat_map(Argument::futures));
            }
        }
        out
    }
}

/// A unit of work in the deployment graph.
#[derive(Debug, Clone)]
pub struct ActionNode {
    /// Stable, content-derived id.
    pub id: ActionId,
    /// The module instance that declared the action.
    pub module: ModuleId,
    /// What the action does.
    pub operation: ActionOperation,
    /// Explicit ordering dependencies in addition to data dependencies.
    pub after: Vec<FutureId>,
    /// The future the action resolves on confirmation.
    pub produces: FutureId,
    /// Actions that must confirm first. Filled in when the graph is assembled.
    pub depends_on: BTreeSet<ActionId>,
}

impl ActionNode {
    /// Create a node. Dependencies are derived later from the graph's futures.
    pub fn new(id: ActionId, module: ModuleId, operation: ActionOperation) -> Self {
        let produces = FutureId::for_action(&id);
        Self {
            id,
            module,
            operation,
            after: Vec::new(),
            produces,
            depends_on: BTreeSet::new(),
        }
    }

    /// Add explicit ordering dependencies.
    pub fn with_after(mut self, after: Vec<FutureId>) -> Self {
        self.after = after;
        self
    }

    /// The action kind.
    pub fn kind(&self) -> ActionKind {
        self.operation.kind()
    }

    /// Every future the action waits on: data inputs first, then `after`.
    pub fn inputs(&self) -> Vec<&FutureId> {
        let mut inputs = self.operation.inputs();
        inputs.extend(self.after.iter());
        inputs
    }
}
