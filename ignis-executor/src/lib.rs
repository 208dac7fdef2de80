//! Ignis Executor - deployment execution engine.
//!
//! This crate runs the graphs built by `ignis-core` against a chain:
//! - Chain adapter trait for submitting and confirming transactions
//! - Dependency-ordered scheduler with a concurrency limit and per-sender
//!   serialization
//! - Journal reconciliation, so an interrupted deployment resumes without
//!   repeating confirmed work
//! - YAML module manifests
//! - Tracing setup
//! - An in-memory chain for tests

#![warn(missing_docs)]

pub mod chain;
pub mod loader;
pub mod observability;
pub mod recovery;
pub mod scheduler;
pub mod testing;

use ignis_core::error::Result;
use ignis_core::module::{BuildContext, ModuleDefinition};
use scheduler::{Executor, RunReport};

/// Build a module with the chain's accounts and deploy it.
///
/// Shorthand for [`Executor::deploy`] with an empty build context.
pub async fn deploy(definition: &ModuleDefinition, executor: &Executor) -> Result<RunReport> {
    executor.deploy(definition, BuildContext::default()).await
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::chain::{
        ChainAdapter, ChainError, ChainFuture, ChainResult, EventLog, Receipt, TxHandle,
        TxRequest, TxStatus,
    };
    pub use crate::deploy;
    pub use crate::loader::{LoadedManifest, ModuleLoader};
    pub use crate::observability::{LogFormat, TracingConfig, TracingGuard, init_tracing};
    pub use crate::recovery::{ReconcileReport, Reconciler, RecoveryAction};
    pub use crate::scheduler::{
        ActionFailure, CancelHandle, ConfirmationPolicy, Executor, ExecutorConfig, RunOutcome,
        RunReport, TimelineEvent, TimelineKind,
    };
    pub use crate::testing::MockChain;
}
