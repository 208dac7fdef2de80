//! Scheduling and execution of deployment graphs.
//!
//! The [`Executor`] dispatches actions in dependency order, at most
//! `max_concurrent_actions` at a time and one transaction per sender,
//! journaling every transition before it is acted on. A run first
//! reconciles the journal so confirmed work is never repeated.

mod config;
mod executor;
mod report;
mod state;
pub(crate) mod work;

pub use config::{ConfirmationPolicy, ExecutorConfig};
pub use executor::{CancelHandle, Executor};
pub use report::{ActionFailure, RunOutcome, RunReport, TimelineEvent, TimelineKind};
