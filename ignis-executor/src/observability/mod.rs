//! Structured logging setup.
//!
//! The engine logs through `tracing`; this module installs a subscriber
//! for binaries and tests that want to see it.
//!
//! - `IGNIS_LOG_FORMAT`: `json`, `pretty` or `compact`
//! - `IGNIS_LOG_LEVEL` (or `RUST_LOG`): filter directives
//!
//! ```ignore
//! use ignis_executor::observability::{TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(TracingConfig::from_env())?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::{TracingGuard, init_tracing};
