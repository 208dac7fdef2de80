//! Core identifier and ledger types.

mod address;
mod ids;

pub use address::{Address, ParseHexError, TxHash};
pub use ids::{ActionId, FutureId, ModuleId, RunId};
