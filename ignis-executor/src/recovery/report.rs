//! Reconciliation report types.

use ignis_core::types::{ActionId, TxHash};
use serde::Serialize;

/// What reconciling the journal against the chain found.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    /// Confirmed in an earlier run; results reused as-is.
    pub reused: Vec<ActionId>,
    /// Submitted earlier and found mined on chain; adopted without resubmitting.
    pub verified: Vec<(ActionId, TxHash)>,
    /// Scheduled to run again, with the reason.
    pub retried: Vec<(ActionId, String)>,
    /// Could not be settled this run (still pending, chain unreachable).
    pub failures: Vec<(ActionId, String)>,
    /// Journal entries for actions the current graph no longer contains.
    pub unknown: Vec<ActionId>,
}

impl ReconcileReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reused action.
    pub fn add_reused(&mut self, action_id: ActionId) {
        self.reused.push(action_id);
    }

    /// Add an action adopted from its on-chain receipt.
    pub fn add_verified(&mut self, action_id: ActionId, tx_hash: TxHash) {
        self.verified.push((action_id, tx_hash));
    }

    /// Add an action that will run again.
    pub fn add_retried(&mut self, action_id: ActionId, reason: impl Into<String>) {
        self.retried.push((action_id, reason.into()));
    }

    /// Add an action that could not be settled.
    pub fn add_failure(&mut self, action_id: ActionId, reason: impl Into<String>) {
        self.failures.push((action_id, reason.into()));
    }

    /// Add a journal entry with no counterpart in the graph.
    pub fn add_unknown(&mut self, action_id: ActionId) {
        self.unknown.push(action_id);
    }

    /// Journal entries looked at.
    pub fn total_processed(&self) -> usize {
        self.reused.len()
            + self.verified.len()
            + self.retried.len()
            + self.failures.len()
            + self.unknown.len()
    }

    /// Whether every journal entry was settled without trouble.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unknown.is_empty()
    }
}

impl std::fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ReconcileReport {{ reused: {}, verified: {}, retried: {}, failures: {}, unknown: {} }}",
            self.reused.len(),
            self.verified.len(),
            self.retried.len(),
            self.failures.len(),
            self.unknown.len()
        )
    }
}
