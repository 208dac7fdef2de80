//! Mutable state of one run.
//!
//! Only the executor loop touches this; worker tasks report back over
//! channels and never see it.

use super::report::{ActionFailure, TimelineEvent, TimelineKind};
use crate::chain::Receipt;
use ignis_core::error::{IgnisError, Result};
use ignis_core::future::FutureTable;
use ignis_core::graph::{ActionNode, ActionStatus, DeploymentGraph};
use ignis_core::types::{ActionId, Address, RunId, TxHash};
use ignis_core::value::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub(crate) struct RunState {
    pub(crate) run_id: RunId,
    status: BTreeMap<ActionId, ActionStatus>,
    pub(crate) futures: FutureTable,
    pub(crate) receipts: HashMap<ActionId, Receipt>,
    pub(crate) tx_hashes: HashMap<ActionId, TxHash>,
    busy_senders: HashMap<Address, ActionId>,
    pub(crate) reused: Vec<ActionId>,
    pub(crate) executed: Vec<ActionId>,
    pub(crate) failures: Vec<ActionFailure>,
    pub(crate) timeline: Vec<TimelineEvent>,
    seq: u64,
}

impl RunState {
    pub(crate) fn new(run_id: RunId, graph: &DeploymentGraph) -> Self {
        Self {
            run_id,
            status: graph
                .nodes()
                .iter()
                .map(|n| (n.id.clone(), ActionStatus::Pending))
                .collect(),
            futures: graph.futures().clone(),
            receipts: HashMap::new(),
            tx_hashes: HashMap::new(),
            busy_senders: HashMap::new(),
            reused: Vec::new(),
            executed: Vec::new(),
            failures: Vec::new(),
            timeline: Vec::new(),
            seq: 0,
        }
    }

    pub(crate) fn status(&self, id: &ActionId) -> ActionStatus {
        self.status.get(id).copied().unwrap_or(ActionStatus::Pending)
    }

    fn advance(&mut self, id: &ActionId, next: ActionStatus) {
        let current = self.status(id);
        if !current.can_transition_to(next) {
            tracing::error!(action_id = %id, from = %current, to = %next, "Illegal status transition");
            return;
        }
        self.status.insert(id.clone(), next);
    }

    fn push_event(&mut self, action_id: &ActionId, kind: TimelineKind) {
        self.timeline.push(TimelineEvent {
            seq: self.seq,
            action_id: action_id.clone(),
            kind,
        });
        self.seq += 1;
    }

    /// Seed an action confirmed before this run started.
    pub(crate) fn seed(
        &mut self,
        node: &ActionNode,
        result: Value,
        tx_hash: Option<TxHash>,
        receipt: Option<Receipt>,
    ) -> Result<()> {
        self.futures.resolve(&node.produces, result)?;
        self.status.insert(node.id.clone(), ActionStatus::Confirmed);
        if let Some(hash) = tx_hash {
            self.tx_hashes.insert(node.id.clone(), hash);
        }
        if let Some(receipt) = receipt {
            self.receipts.insert(node.id.clone(), receipt);
        }
        self.reused.push(node.id.clone());
        self.push_event(&node.id, TimelineKind::Reused);
        Ok(())
    }

    /// Whether the action can be dispatched: still pending, inputs resolved.
    pub(crate) fn is_ready(&self, node: &ActionNode) -> bool {
        self.status(&node.id) == ActionStatus::Pending && self.futures.all_resolved(node.inputs())
    }

    pub(crate) fn sender_busy(&self, sender: &Address) -> bool {
        self.busy_senders.contains_key(sender)
    }

    pub(crate) fn mark_dispatched(&mut self, id: &ActionId, sender: Option<Address>) {
        self.advance(id, ActionStatus::Ready);
        if let Some(sender) = sender {
            self.busy_senders.insert(sender, id.clone());
        }
        self.push_event(id, TimelineKind::Dispatched);
    }

    pub(crate) fn mark_submitted(&mut self, id: &ActionId, tx_hash: TxHash) {
        self.advance(id, ActionStatus::Submitted);
        self.tx_hashes.insert(id.clone(), tx_hash);
        self.push_event(id, TimelineKind::Submitted);
    }

    pub(crate) fn mark_confirmed(
        &mut self,
        node: &ActionNode,
        value: Value,
        receipt: Option<Receipt>,
    ) -> Result<()> {
        self.release_sender(&node.id);
        self.futures.resolve(&node.produces, value)?;
        self.advance(&node.id, ActionStatus::Confirmed);
        if let Some(receipt) = receipt {
            self.receipts.insert(node.id.clone(), receipt);
        }
        self.executed.push(node.id.clone());
        self.push_event(&node.id, TimelineKind::Confirmed);
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self, id: &ActionId, error: IgnisError) {
        self.release_sender(id);
        self.advance(id, ActionStatus::Failed);
        self.failures.push(ActionFailure {
            action_id: id.clone(),
            error,
        });
        self.push_event(id, TimelineKind::Failed);
    }

    fn release_sender(&mut self, id: &ActionId) {
        self.busy_senders.retain(|_, holder| holder != id);
    }

    /// Split the unconfirmed, unfailed actions into blocked and pending.
    pub(crate) fn leftovers(&self, graph: &DeploymentGraph) -> (Vec<ActionId>, Vec<ActionId>) {
        let mut blocked = BTreeSet::new();
        for failure in &self.failures {
            for dependent in graph.transitive_dependents(&failure.action_id) {
                if !self.status(&dependent).is_terminal() {
                    blocked.insert(dependent);
                }
            }
        }

        let pending = self
            .status
            .iter()
            .filter(|(id, status)| !status.is_terminal() && !blocked.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();
        (blocked.into_iter().collect(), pending)
    }

    pub(crate) fn all_confirmed(&self) -> bool {
        self.status.values().all(|s| *s == ActionStatus::Confirmed)
    }

    /// Root outputs whose futures are resolved.
    pub(crate) fn outputs(&self, graph: &DeploymentGraph) -> BTreeMap<String, Value> {
        graph
            .outputs()
            .iter()
            .filter_map(|(name, id)| {
                self.futures
                    .value(id)
                    .ok()
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }
}
