//! Transactions, receipts and events as seen by the executor.

use ignis_core::{Address, TxHash, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A transaction the executor asks the adapter to broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxRequest {
    /// Deploy a contract.
    Deploy {
        /// Contract (artifact) name.
        contract: String,
        /// Constructor arguments, fully resolved.
        args: Vec<Value>,
        /// Native amount sent with the deployment.
        value: Option<Value>,
        /// Sending account.
        from: Address,
    },
    /// Call a method on a deployed contract.
    Call {
        /// Target address.
        to: Address,
        /// Contract name the target was deployed or bound as.
        contract: String,
        /// Method name.
        method: String,
        /// Call arguments, fully resolved.
        args: Vec<Value>,
        /// Native amount sent with the call.
        value: Option<Value>,
        /// Sending account.
        from: Address,
    },
}

impl TxRequest {
    /// The sending account.
    pub fn from(&self) -> Address {
        match self {
            Self::Deploy { from, .. } | Self::Call { from, .. } => *from,
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Deploy { contract, .. } => format!("deploy {}", contract),
            Self::Call {
                contract, method, ..
            } => format!("call {}.{}", contract, method),
        }
    }
}

/// Handle to a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle {
    /// Transaction hash.
    pub hash: TxHash,
    /// Sending account.
    pub from: Address,
}

impl TxHandle {
    /// Create a handle.
    pub fn new(hash: TxHash, from: Address) -> Self {
        Self { hash, from }
    }
}

/// One decoded event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    /// Contract that emitted the event.
    pub emitter: Address,
    /// Event name.
    pub event: String,
    /// Named arguments.
    pub args: BTreeMap<String, Value>,
}

impl EventLog {
    /// Create an event log.
    pub fn new(emitter: Address, event: impl Into<String>) -> Self {
        Self {
            emitter,
            event: event.into(),
            args: BTreeMap::new(),
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Sending account.
    pub from: Address,
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Address of the created contract, for deployments.
    pub contract_address: Option<Address>,
    /// Events emitted, in order.
    pub logs: Vec<EventLog>,
    /// Revert reason, when execution failed.
    pub revert_reason: Option<String>,
}

/// On-chain status of a transaction hash.
#[derive(Debug, Clone, PartialEq)]
pub enum TxStatus {
    /// The chain has never seen the transaction.
    NotFound,
    /// Broadcast but not yet mined.
    Pending,
    /// Mined, with the current confirmation depth.
    Mined {
        /// The receipt.
        receipt: Receipt,
        /// Blocks on top of (and including) the inclusion block.
        confirmations: u64,
    },
}
