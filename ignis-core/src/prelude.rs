//! Prelude for convenient imports.
//!
//! ```ignore
//! use ignis_core::prelude::*;
//! ```

// Core types
pub use crate::types::{ActionId, Address, FutureId, ModuleId, RunId, TxHash};
pub use crate::value::Value;

// Error handling
pub use crate::error::{IgnisError, Result};

// Futures
pub use crate::future::{Argument, Future, FutureKind, FutureRef, FutureTable};

// Graph
pub use crate::graph::{ActionKind, ActionNode, ActionOperation, ActionStatus, DeploymentGraph};

// Modules
pub use crate::module::{
    ActionOptions, BuildContext, ModuleBuilder, ModuleDefinition, ModuleOutputs, ReadEventOptions,
    build,
};

// Journal
pub use crate::journal::{
    Journal, JournalConfig, JournalEntry, JournalReader, JournalRecord, JournalRecordType,
    JournalState,
};
