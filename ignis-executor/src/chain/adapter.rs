//! The chain adapter trait and its error type.

use super::types::{EventLog, Receipt, TxHandle, TxRequest, TxStatus};
use ignis_core::{Address, TxHash, Value};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a chain adapter.
///
/// The executor maps these onto action-level errors: `Rejected` on submit
/// becomes a submission failure, `Timeout` a confirmation timeout,
/// `NotFound` from event decoding a missing event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The backend refused the request (bad input, insufficient funds, nonce).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Waiting for the chain took longer than allowed.
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// The requested transaction, receipt or event does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection or protocol failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Type alias for async chain futures.
pub type ChainFuture<'a, T> = Pin<Box<dyn Future<Output = ChainResult<T>> + Send + 'a>>;

/// Backend that broadcasts transactions and reports their outcome.
///
/// # Implementation Notes
///
/// - All I/O methods are async and must be `Send`
/// - `submit` returns as soon as the transaction is broadcast; it must not
///   wait for inclusion
/// - `wait_for_confirmation` polls at `poll_interval` until the receipt has
///   `required` confirmations; the executor bounds it with its own deadline
/// - `transaction_status` must answer for any hash the backend has ever
///   broadcast, so interrupted runs can be reconciled
pub trait ChainAdapter: Send + Sync {
    /// Signer accounts, in the order modules index them.
    fn accounts(&self) -> ChainFuture<'_, Vec<Address>>;

    /// Broadcast a deployment or call.
    fn submit(&self, request: TxRequest) -> ChainFuture<'_, TxHandle>;

    /// Wait until the transaction is mined with `required` confirmations.
    ///
    /// A reverted transaction still yields its receipt, with
    /// `success == false`.
    fn wait_for_confirmation<'a>(
        &'a self,
        handle: &'a TxHandle,
        required: u64,
        poll_interval: Duration,
    ) -> ChainFuture<'a, Receipt>;

    /// Current status of a transaction hash.
    fn transaction_status<'a>(&'a self, hash: &'a TxHash) -> ChainFuture<'a, TxStatus>;

    /// Address of the contract created by a deployment.
    fn read_address<'a>(&'a self, handle: &'a TxHandle) -> ChainFuture<'a, Address>;

    /// Encode a method call into calldata.
    fn encode_call(&self, contract: &str, method: &str, args: &[Value]) -> ChainResult<Value>;

    /// Every `event` in the receipt, optionally restricted to one emitter,
    /// as argument maps in log order.
    ///
    /// Fails with `NotFound` when no log matches.
    fn decode_event(
        &self,
        receipt: &Receipt,
        emitter: Option<Address>,
        event: &str,
    ) -> ChainResult<Vec<EventLog>> {
        let matches: Vec<EventLog> = receipt
            .logs
            .iter()
            .filter(|log| log.event == event)
            .filter(|log| emitter.is_none_or(|e| log.emitter == e))
            .cloned()
            .collect();

        if matches.is_empty() {
            return Err(ChainError::NotFound(format!(
                "event '{}' in receipt of {}",
                event, receipt.tx_hash
            )));
        }
        Ok(matches)
    }
}
