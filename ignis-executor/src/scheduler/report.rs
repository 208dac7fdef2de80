//! Run report types.

use crate::recovery::ReconcileReport;
use ignis_core::error::{IgnisError, Result};
use ignis_core::types::{ActionId, RunId};
use ignis_core::value::Value;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every action is confirmed.
    Completed,
    /// At least one action failed.
    Failed,
    /// Cancelled before every action was confirmed.
    Cancelled,
}

/// A step in the logical timeline of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    /// Confirmed in an earlier run.
    Reused,
    /// Handed to a worker.
    Dispatched,
    /// Transaction broadcast.
    Submitted,
    /// Outcome confirmed and journaled.
    Confirmed,
    /// Outcome failed and journaled.
    Failed,
}

/// One timeline entry. Sequence numbers are strictly increasing within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    /// Position in the run.
    pub seq: u64,
    /// The action.
    pub action_id: ActionId,
    /// What happened.
    pub kind: TimelineKind,
}

/// A failed action and its cause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    /// The action.
    pub action_id: ActionId,
    /// The cause.
    #[serde(serialize_with = "serialize_display")]
    pub error: IgnisError,
}

fn serialize_display<S: Serializer>(error: &IgnisError, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Result of running a deployment graph.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The run.
    pub run_id: RunId,
    /// How it ended.
    pub outcome: RunOutcome,
    /// Resolved root module outputs. Outputs whose producer did not
    /// confirm are absent.
    pub outputs: BTreeMap<String, Value>,
    /// Actions confirmed in an earlier run.
    pub reused: Vec<ActionId>,
    /// Actions confirmed in this run, in confirmation order.
    pub executed: Vec<ActionId>,
    /// Failed actions.
    pub failures: Vec<ActionFailure>,
    /// Actions that cannot run because something they depend on failed.
    pub blocked: Vec<ActionId>,
    /// Actions never dispatched for any other reason (cancel, fail-fast).
    pub pending: Vec<ActionId>,
    /// Logical order of events.
    pub timeline: Vec<TimelineEvent>,
    /// What reconciliation against the journal found.
    pub reconciliation: ReconcileReport,
}

impl RunReport {
    /// Whether every action is confirmed.
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// A resolved output.
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Every confirmed action: reused first, then executed.
    pub fn confirmed(&self) -> impl Iterator<Item = &ActionId> {
        self.reused.iter().chain(self.executed.iter())
    }

    /// Whether an action is confirmed.
    pub fn is_confirmed(&self, action_id: &ActionId) -> bool {
        self.confirmed().any(|a| a == action_id)
    }

    /// The failure recorded for an action.
    pub fn failure(&self, action_id: &ActionId) -> Option<&IgnisError> {
        self.failures
            .iter()
            .find(|f| &f.action_id == action_id)
            .map(|f| &f.error)
    }

    /// Sequence number of the first `kind` event for an action.
    pub fn seq_of(&self, action_id: &ActionId, kind: TimelineKind) -> Option<u64> {
        self.timeline
            .iter()
            .find(|e| &e.action_id == action_id && e.kind == kind)
            .map(|e| e.seq)
    }

    /// The outputs, or the error that ended the run.
    pub fn into_result(self) -> Result<BTreeMap<String, Value>> {
        match self.outcome {
            RunOutcome::Completed => Ok(self.outputs),
            RunOutcome::Cancelled => Err(IgnisError::Cancelled {
                run_id: self.run_id,
            }),
            RunOutcome::Failed => Err(self
                .failures
                .into_iter()
                .next()
                .map(|f| f.error)
                .unwrap_or(IgnisError::Cancelled {
                    run_id: self.run_id,
                })),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run {} {:?}: {} reused, {} executed, {} failed, {} blocked, {} pending",
            self.run_id,
            self.outcome,
            self.reused.len(),
            self.executed.len(),
            self.failures.len(),
            self.blocked.len(),
            self.pending.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.action_id, failure.error)?;
        }
        Ok(())
    }
}
