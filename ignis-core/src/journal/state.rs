//! Per-action state replayed from journal records.

use super::record::{JournalRecord, JournalRecordType};
use crate::error::{IgnisError, Result};
use crate::graph::ActionStatus;
use crate::types::{ActionId, RunId, TxHash};
use crate::value::Value;
use std::collections::BTreeMap;

/// The latest known state of one action.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// The action.
    pub action_id: ActionId,
    /// Last recorded status: Submitted, Confirmed or Failed.
    pub status: ActionStatus,
    /// The result, present exactly when Confirmed.
    pub result: Option<Value>,
    /// The last broadcast transaction, if any.
    pub tx_hash: Option<TxHash>,
    /// The recorded error, for failures.
    pub error: Option<String>,
    /// The run that wrote the entry.
    pub run_id: RunId,
    /// When the entry was written.
    pub timestamp_ns: u64,
}

impl JournalEntry {
    /// Whether the action is confirmed and its result can be reused.
    pub fn is_confirmed(&self) -> bool {
        self.status == ActionStatus::Confirmed
    }
}

/// Journal contents folded into the latest entry per action.
#[derive(Debug, Clone, Default)]
pub struct JournalState {
    entries: BTreeMap<ActionId, JournalEntry>,
    runs: Vec<RunId>,
}

impl JournalState {
    /// Replay records in order.
    pub fn from_records(records: impl IntoIterator<Item = JournalRecord>) -> Result<Self> {
        let mut state = Self::default();
        for record in records {
            state.apply(record)?;
        }
        Ok(state)
    }

    /// Apply one record.
    ///
    /// A confirmed action stays confirmed: a repeated confirmation is ignored
    /// and any other transition out of Confirmed is rejected.
    pub fn apply(&mut self, record: JournalRecord) -> Result<()> {
        if record.record_type == JournalRecordType::RunStarted {
            self.runs.push(record.run_id);
            return Ok(());
        }

        let Some(status) = record.record_type.action_status() else {
            return Ok(());
        };
        let action_id = record.action_id.clone().ok_or_else(|| IgnisError::JournalCorruption {
            offset: 0,
            cause: format!("{:?} record without an action id", record.record_type),
        })?;

        if let Some(previous) = self.entries.get(&action_id) {
            if previous.is_confirmed() {
                if status == ActionStatus::Confirmed {
                    return Ok(());
                }
                return Err(IgnisError::JournalTransition {
                    action_id,
                    from: previous.status.to_string(),
                    to: status.to_string(),
                });
            }
        }

        if status == ActionStatus::Confirmed && record.result.is_none() {
            return Err(IgnisError::JournalCorruption {
                offset: 0,
                cause: format!("confirmation of {} carries no result", action_id),
            });
        }

        let entry = JournalEntry {
            action_id: action_id.clone(),
            status,
            result: record.result,
            tx_hash: record.tx_hash,
            error: record.error,
            run_id: record.run_id,
            timestamp_ns: record.timestamp_ns,
        };
        self.entries.insert(action_id, entry);
        Ok(())
    }

    /// The entry for an action.
    pub fn get(&self, action_id: &ActionId) -> Option<&JournalEntry> {
        self.entries.get(action_id)
    }

    /// All entries in action id order.
    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.values()
    }

    /// Confirmed entries only.
    pub fn confirmed(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.values().filter(|e| e.is_confirmed())
    }

    /// Number of actions with an entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal holds no action entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs recorded in the journal, oldest first.
    pub fn runs(&self) -> &[RunId] {
        &self.runs
    }
}
