//! Error types for Ignis.
//!
//! Every error carries the identifiers needed to act on it (action id,
//! module, transaction hash) and a stable code prefix in its message.

use crate::types::{ActionId, FutureId, RunId, TxHash};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Ignis operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IgnisError {
    // =========================================================================
    // Build Errors (E100-E199)
    // =========================================================================
    /// The action graph contains a dependency cycle.
    #[error("E101: Cyclic dependency between actions: {}", format_cycle(.cycle))]
    CyclicGraph {
        /// The actions forming the cycle, first element repeated at the end.
        cycle: Vec<ActionId>,
    },

    /// Two actions or modules claim the same identity.
    #[error("E102: Duplicate id '{id}' in module {module}: {hint}")]
    DuplicateId {
        /// The duplicated id.
        id: String,
        /// The module where the duplicate was declared.
        module: String,
        /// How to resolve the conflict.
        hint: String,
    },

    /// A reference to an account, parameter, future or local name cannot be resolved.
    #[error("E103: Unresolved reference '{reference}' in module {module}: {cause}")]
    UnresolvedReference {
        /// The reference as written.
        reference: String,
        /// The module containing the reference.
        module: String,
        /// Why it could not be resolved.
        cause: String,
    },

    /// A future of the wrong kind was passed where another kind is required.
    #[error(
        "E104: Action {action_id} expects a {expected} future, but '{future_id}' is a {actual}"
    )]
    InvalidFutureKind {
        /// The consuming action.
        action_id: ActionId,
        /// The offending future.
        future_id: FutureId,
        /// The required kind.
        expected: String,
        /// The kind actually supplied.
        actual: String,
    },

    /// A module definition callback failed or returned inconsistent outputs.
    #[error("E105: Invalid module definition '{module}': {cause}")]
    ModuleDefinition {
        /// The module name.
        module: String,
        /// Description of the problem.
        cause: String,
    },

    /// A module uses itself, directly or transitively.
    #[error("E106: Module '{module}' uses itself via {path}")]
    ModuleCycle {
        /// The module that closes the cycle.
        module: String,
        /// The chain of module uses, e.g. `A -> B -> A`.
        path: String,
    },

    // =========================================================================
    // Future Errors (E200-E299)
    // =========================================================================
    /// A future was resolved a second time.
    #[error("E201: Future '{future_id}' is already resolved")]
    DoubleResolution {
        /// The future.
        future_id: FutureId,
    },

    /// A future was read before it was resolved.
    #[error("E202: Future '{future_id}' is not resolved yet")]
    FutureUnresolved {
        /// The future.
        future_id: FutureId,
    },

    // =========================================================================
    // Execution Errors (E300-E399)
    // =========================================================================
    /// The chain refused the transaction.
    #[error("E301: Submission of action {action_id} failed: {cause}")]
    Submission {
        /// The action being submitted.
        action_id: ActionId,
        /// Reason given by the chain adapter.
        cause: String,
    },

    /// The transaction did not reach the required confirmations in time.
    #[error("E302: Action {action_id} not confirmed within {timeout_ms}ms (tx {tx_hash})")]
    ConfirmationTimeout {
        /// The waiting action.
        action_id: ActionId,
        /// The broadcast transaction.
        tx_hash: TxHash,
        /// The configured deadline.
        timeout_ms: u64,
    },

    /// The requested event is absent from the receipt.
    #[error("E303: Event '{event}' not emitted for action {action_id}")]
    EventNotFound {
        /// The reading action.
        action_id: ActionId,
        /// The event name.
        event: String,
    },

    /// The event was emitted but does not carry the argument.
    #[error("E304: Event '{event}' has no argument '{argument}' (action {action_id})")]
    ArgumentNotFound {
        /// The reading action.
        action_id: ActionId,
        /// The event name.
        event: String,
        /// The missing argument.
        argument: String,
    },

    /// The transaction was mined but reverted.
    #[error("E305: Transaction {tx_hash} for action {action_id} reverted: {reason}")]
    TransactionReverted {
        /// The action.
        action_id: ActionId,
        /// The reverted transaction.
        tx_hash: TxHash,
        /// Revert reason, if any.
        reason: String,
    },

    /// The run was cancelled before the action was dispatched.
    #[error("E306: Run {run_id} cancelled")]
    Cancelled {
        /// The cancelled run.
        run_id: RunId,
    },

    /// Transport or node failure while talking to the chain.
    #[error("E307: Chain error for action {action_id}: {cause}")]
    Chain {
        /// The action.
        action_id: ActionId,
        /// Description of the failure.
        cause: String,
    },

    /// The action never ran because a dependency failed.
    #[error("E308: Action {action_id} blocked by failed dependency {blocked_by}")]
    ActionBlocked {
        /// The blocked action.
        action_id: ActionId,
        /// The failed upstream action.
        blocked_by: ActionId,
    },

    /// A resolved input does not have the shape the action needs.
    #[error("E309: Invalid input for action {action_id}: {cause}")]
    InvalidInput {
        /// The action.
        action_id: ActionId,
        /// Description of the mismatch.
        cause: String,
    },

    // =========================================================================
    // Journal Errors (E600-E699)
    // =========================================================================
    /// Failed to append to the journal.
    #[error("E601: Journal write failed at {path}: {cause}")]
    JournalWrite {
        /// The journal file.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Failed to read the journal.
    #[error("E602: Journal read failed at {path}: {cause}")]
    JournalRead {
        /// The journal file.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// A complete journal record failed validation.
    #[error("E603: Journal corruption at offset {offset}: {cause}")]
    JournalCorruption {
        /// Byte offset of the bad record.
        offset: u64,
        /// Description of the corruption.
        cause: String,
    },

    /// Another orchestrator holds the journal lock.
    #[error("E604: Journal at {path} is locked by another process")]
    JournalLocked {
        /// The lock file.
        path: PathBuf,
    },

    /// The journal records an impossible status transition.
    #[error("E605: Invalid journal transition for action {action_id}: {from} -> {to}")]
    JournalTransition {
        /// The action.
        action_id: ActionId,
        /// Last recorded status.
        from: String,
        /// Status of the offending record.
        to: String,
    },

    // =========================================================================
    // Configuration Errors (E800-E899)
    // =========================================================================
    /// Failed to parse a YAML module manifest.
    #[error("E801: Failed to parse manifest {source_name}: {cause}")]
    YamlParse {
        /// File path or a label for in-memory input.
        source_name: String,
        /// Parse error description.
        cause: String,
    },

    /// A configuration value is out of range or malformed.
    #[error("E802: Invalid configuration value for '{field}': {cause}")]
    ConfigValue {
        /// The field or environment variable.
        field: String,
        /// Reason the value was rejected.
        cause: String,
    },

    /// Serialization/deserialization error.
    #[error("E804: Serialization error: {0}")]
    Serialization(
        /// The serialization error message.
        String,
    ),

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// File I/O error.
    #[error("E901: I/O error at {path}: {cause}")]
    Io {
        /// The path where the I/O error occurred.
        path: PathBuf,
        /// Description of the I/O error.
        cause: String,
    },
}

fn format_cycle(cycle: &[ActionId]) -> String {
    cycle
        .iter()
        .map(ActionId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl IgnisError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CyclicGraph { .. } => "E101",
            Self::DuplicateId { .. } => "E102",
            Self::UnresolvedReference { .. } => "E103",
            Self::InvalidFutureKind { .. } => "E104",
            Self::ModuleDefinition { .. } => "E105",
            Self::ModuleCycle { .. } => "E106",
            Self::DoubleResolution { .. } => "E201",
            Self::FutureUnresolved { .. } => "E202",
            Self::Submission { .. } => "E301",
            Self::ConfirmationTimeout { .. } => "E302",
            Self::EventNotFound { .. } => "E303",
            Self::ArgumentNotFound { .. } => "E304",
            Self::TransactionReverted { .. } => "E305",
            Self::Cancelled { .. } => "E306",
            Self::Chain { .. } => "E307",
            Self::ActionBlocked { .. } => "E308",
            Self::InvalidInput { .. } => "E309",
            Self::JournalWrite { .. } => "E601",
            Self::JournalRead { .. } => "E602",
            Self::JournalCorruption { .. } => "E603",
            Self::JournalLocked { .. } => "E604",
            Self::JournalTransition { .. } => "E605",
            Self::YamlParse { .. } => "E801",
            Self::ConfigValue { .. } => "E802",
            Self::Serialization(_) => "E804",
            Self::Io { .. } => "E901",
        }
    }

    /// Check if a later run may succeed where this one failed.
    ///
    /// Timeouts stay retriable because reconciliation re-checks the chain
    /// before anything is resubmitted.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ConfirmationTimeout { .. }
                | Self::Chain { .. }
                | Self::Cancelled { .. }
                | Self::ActionBlocked { .. }
                | Self::JournalLocked { .. }
        )
    }

    /// Check if this error is raised while building the graph.
    #[must_use]
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::CyclicGraph { .. }
                | Self::DuplicateId { .. }
                | Self::UnresolvedReference { .. }
                | Self::InvalidFutureKind { .. }
                | Self::ModuleDefinition { .. }
                | Self::ModuleCycle { .. }
        )
    }

    /// Check if this error is local to a single action.
    #[must_use]
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            Self::Submission { .. }
                | Self::ConfirmationTimeout { .. }
                | Self::EventNotFound { .. }
                | Self::ArgumentNotFound { .. }
                | Self::TransactionReverted { .. }
                | Self::Cancelled { .. }
                | Self::Chain { .. }
                | Self::ActionBlocked { .. }
                | Self::InvalidInput { .. }
        )
    }

    /// Check if this error concerns the journal. Journal errors are fatal to the run.
    #[must_use]
    pub fn is_journal_error(&self) -> bool {
        matches!(
            self,
            Self::JournalWrite { .. }
                | Self::JournalRead { .. }
                | Self::JournalCorruption { .. }
                | Self::JournalLocked { .. }
                | Self::JournalTransition { .. }
        )
    }
}

impl From<serde_json::Error> for IgnisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using `IgnisError`.
pub type Result<T> = std::result::Result<T, IgnisError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleId;

    #[test]
    fn error_codes_are_correct() {
        let err = IgnisError::CyclicGraph { cycle: vec![] };
        assert_eq!(err.code(), "E101");

        let err = IgnisError::JournalLocked {
            path: PathBuf::from("/tmp/journal.lock"),
        };
        assert_eq!(err.code(), "E604");
    }

    #[test]
    fn cycle_display_lists_path() {
        let module = ModuleId::new("M", None);
        let err = IgnisError::CyclicGraph {
            cycle: vec![
                ActionId::new(&module, "A"),
                ActionId::new(&module, "B"),
                ActionId::new(&module, "A"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("E101"));
        assert!(msg.contains("M#A -> M#B -> M#A"));
    }

    #[test]
    fn classification() {
        let action_id = ActionId::new(&ModuleId::new("X", None), "Token");
        let submission = IgnisError::Submission {
            action_id: action_id.clone(),
            cause: "insufficient funds".to_string(),
        };
        assert!(submission.is_execution_error());
        assert!(!submission.is_retriable());
        assert!(!submission.is_build_error());

        let timeout = IgnisError::ConfirmationTimeout {
            action_id,
            tx_hash: TxHash::new([1; 32]),
            timeout_ms: 5000,
        };
        assert!(timeout.is_retriable());
        assert!(timeout.to_string().contains("5000ms"));

        let corrupt = IgnisError::JournalCorruption {
            offset: 42,
            cause: "checksum mismatch".to_string(),
        };
        assert!(corrupt.is_journal_error());
        assert!(!corrupt.is_execution_error());
    }
}
