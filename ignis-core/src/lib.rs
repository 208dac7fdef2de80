//! Ignis Core Library
//!
//! Foundational types for the Ignis deployment engine: a declarative way to
//! describe on-chain deployments as modules, and the pieces needed to run
//! them exactly once.
//!
//! # Key Components
//!
//! - **Future Model**: typed placeholders for values known only after an
//!   action confirms (addresses, event arguments, encoded calls)
//! - **Module Graph Builder**: turns module definitions into a validated DAG
//!   of actions, deduplicating shared modules by identity
//! - **Execution Journal**: append-only, checksummed log of action outcomes
//!   that makes runs resumable after a crash
//!
//! # Example
//!
//! ```ignore
//! use ignis_core::prelude::*;
//!
//! let proxy = ModuleDefinition::new("ProxyModule", |m| {
//!     let owner = m.get_account(0)?;
//!     let boxed = m.contract("Box", vec![])?;
//!     let proxy = m.contract(
//!         "TransparentUpgradeableProxy",
//!         vec![Argument::from(&boxed), Argument::from(&owner), Argument::from("0x")],
//!     )?;
//!     let admin = m.read_event_argument(&proxy, "AdminChanged", "newAdmin")?;
//!     let proxy_admin = m.contract_at("ProxyAdmin", &admin)?;
//!     Ok(ModuleOutputs::new()
//!         .with("proxyAdmin", &proxy_admin)
//!         .with("proxy", &proxy))
//! });
//!
//! let graph = build(&proxy, &BuildContext::new(accounts))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod future;
pub mod graph;
pub mod journal;
pub mod module;
pub mod prelude;
pub mod types;
pub mod value;

// Re-export key types at crate root for convenience
pub use error::{IgnisError, Result};
pub use future::{Argument, Future, FutureKind, FutureRef, FutureTable};
pub use graph::{ActionKind, ActionNode, ActionOperation, ActionStatus, DeploymentGraph};
pub use journal::{Journal, JournalConfig};
pub use module::{BuildContext, ModuleBuilder, ModuleDefinition, ModuleOutputs, build};
pub use types::{ActionId, Address, FutureId, ModuleId, RunId, TxHash};
pub use value::Value;
