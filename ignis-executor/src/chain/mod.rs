//! Chain adapter boundary.
//!
//! The executor never talks to a node directly. Everything it needs from a
//! chain (accounts, broadcasting, confirmation, receipts and event
//! decoding) goes through the [`ChainAdapter`] trait, so the same
//! scheduler drives a real JSON-RPC backend or the in-memory
//! [`MockChain`](crate::testing::MockChain).

mod adapter;
mod types;

pub use adapter::{ChainAdapter, ChainError, ChainFuture, ChainResult};
pub use types::{EventLog, Receipt, TxHandle, TxRequest, TxStatus};
