//! Reconciling the journal against the chain.
//!
//! Before a run dispatches anything, every journal entry for an action in
//! the graph is settled:
//!
//! - **Reuse**: the action was confirmed; its recorded result seeds the run
//! - **Verify**: a transaction was broadcast but its outcome was never
//!   recorded as Confirmed; the chain decides
//! - **Execute**: nothing trustworthy was recorded; the action runs
//!
//! A Submitted entry is never taken as success on its own. Verification
//! adopts a mined, successful transaction without resubmitting it, waits
//! for a pending one, and only resubmits when the chain has no record of
//! the transaction or it reverted.

mod report;

pub use report::ReconcileReport;

use crate::chain::{ChainAdapter, Receipt, TxHandle, TxStatus};
use crate::scheduler::ConfirmationPolicy;
use crate::scheduler::work::{confirm, sender_of, transaction_result};
use ignis_core::error::{IgnisError, Result};
use ignis_core::graph::{ActionNode, DeploymentGraph};
use ignis_core::journal::{Journal, JournalEntry, JournalRecord, JournalState};
use ignis_core::types::{ActionId, Address, RunId, TxHash};
use ignis_core::value::Value;
use std::collections::BTreeMap;

/// What to do with an action given its journal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Confirmed earlier; reuse the result.
    Reuse {
        /// The recorded result.
        result: Value,
        /// The transaction that produced it, if any.
        tx_hash: Option<TxHash>,
    },
    /// A transaction may exist on chain; check before resubmitting.
    Verify {
        /// The transaction to look up.
        tx_hash: TxHash,
    },
    /// Run the action.
    Execute,
}

impl RecoveryAction {
    /// Decide from the latest journal entry.
    pub fn for_entry(entry: Option<&JournalEntry>) -> Self {
        let Some(entry) = entry else {
            return Self::Execute;
        };
        match (&entry.result, entry.tx_hash) {
            (Some(result), tx_hash) if entry.is_confirmed() => Self::Reuse {
                result: result.clone(),
                tx_hash,
            },
            (_, Some(tx_hash)) => Self::Verify { tx_hash },
            _ => Self::Execute,
        }
    }
}

/// An action settled before dispatch.
#[derive(Debug, Clone)]
pub struct SettledAction {
    /// The result its future resolves to.
    pub result: Value,
    /// The transaction that produced it, if any.
    pub tx_hash: Option<TxHash>,
    /// The receipt, when it was fetched during verification.
    pub receipt: Option<Receipt>,
}

/// Outcome of reconciliation.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Actions to seed as confirmed.
    pub confirmed: BTreeMap<ActionId, SettledAction>,
    /// Actions that fail this run without being resubmitted.
    pub failed: Vec<(ActionId, IgnisError)>,
    /// Summary for the run report.
    pub report: ReconcileReport,
}

enum Verification {
    Adopted(SettledAction),
    Retry(String),
    Unsettled(IgnisError),
}

/// Settles journal entries against the chain.
pub struct Reconciler<'a> {
    chain: &'a dyn ChainAdapter,
    journal: &'a Journal,
    policy: ConfirmationPolicy,
    run_id: RunId,
    default_sender: Option<Address>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler writing its findings under `run_id`.
    pub fn new(
        chain: &'a dyn ChainAdapter,
        journal: &'a Journal,
        policy: ConfirmationPolicy,
        run_id: RunId,
    ) -> Self {
        Self {
            chain,
            journal,
            policy,
            run_id,
            default_sender: None,
        }
    }

    /// The account actions without an explicit sender use.
    pub fn with_default_sender(mut self, sender: Option<Address>) -> Self {
        self.default_sender = sender;
        self
    }

    /// Settle every journal entry that belongs to the graph.
    ///
    /// Only journal failures are returned as errors; chain trouble leaves
    /// the affected action failed for this run.
    pub async fn reconcile(
        &self,
        graph: &DeploymentGraph,
        state: &JournalState,
    ) -> Result<Reconciliation> {
        let mut out = Reconciliation::default();

        for node in graph.nodes() {
            let entry = state.get(&node.id);
            match RecoveryAction::for_entry(entry) {
                RecoveryAction::Reuse { result, tx_hash } => {
                    out.confirmed.insert(
                        node.id.clone(),
                        SettledAction {
                            result,
                            tx_hash,
                            receipt: None,
                        },
                    );
                    out.report.add_reused(node.id.clone());
                }
                RecoveryAction::Verify { tx_hash } => {
                    match self.verify(graph, node, tx_hash).await? {
                        Verification::Adopted(settled) => {
                            tracing::info!(action_id = %node.id, tx_hash = %tx_hash, "Adopted transaction from earlier run");
                            out.report.add_verified(node.id.clone(), tx_hash);
                            out.confirmed.insert(node.id.clone(), settled);
                        }
                        Verification::Retry(reason) => {
                            tracing::info!(action_id = %node.id, reason = %reason, "Resubmitting action");
                            out.report.add_retried(node.id.clone(), reason);
                        }
                        Verification::Unsettled(error) => {
                            tracing::warn!(action_id = %node.id, error = %error, "Could not settle earlier transaction");
                            out.report.add_failure(node.id.clone(), error.to_string());
                            out.failed.push((node.id.clone(), error));
                        }
                    }
                }
                RecoveryAction::Execute => {
                    if let Some(entry) = entry {
                        let reason = entry
                            .error
                            .clone()
                            .unwrap_or_else(|| format!("last recorded as {}", entry.status));
                        out.report.add_retried(node.id.clone(), reason);
                    }
                }
            }
        }

        for entry in state.entries() {
            if !graph.contains(&entry.action_id) {
                out.report.add_unknown(entry.action_id.clone());
            }
        }

        if out.report.total_processed() > 0 {
            tracing::info!(report = %out.report, "Journal reconciled");
        }
        Ok(out)
    }

    async fn verify(
        &self,
        graph: &DeploymentGraph,
        node: &ActionNode,
        tx_hash: TxHash,
    ) -> Result<Verification> {
        let status = match self.chain.transaction_status(&tx_hash).await {
            Ok(status) => status,
            Err(e) => {
                return self.unsettled(
                    node,
                    tx_hash,
                    IgnisError::Chain {
                        action_id: node.id.clone(),
                        cause: e.to_string(),
                    },
                );
            }
        };

        let receipt = match status {
            TxStatus::NotFound => {
                return Ok(Verification::Retry(format!(
                    "transaction {} not found on chain",
                    tx_hash
                )));
            }
            TxStatus::Mined {
                receipt,
                confirmations,
            } if confirmations >= self.policy.required_confirmations => {
                if !receipt.success {
                    return self.reverted(node, tx_hash, receipt.revert_reason);
                }
                receipt
            }
            TxStatus::Mined { receipt, .. } => {
                let handle = TxHandle::new(tx_hash, receipt.from);
                match self.wait(node, &handle).await {
                    Ok(receipt) => receipt,
                    Err(v) => return v,
                }
            }
            TxStatus::Pending => {
                let sender = match sender_of(node, graph.futures(), self.default_sender) {
                    Ok(Some(sender)) => sender,
                    Ok(None) => {
                        let error = IgnisError::InvalidInput {
                            action_id: node.id.clone(),
                            cause: format!("pending transaction {} has no sender", tx_hash),
                        };
                        return self.unsettled(node, tx_hash, error);
                    }
                    Err(error) => return self.unsettled(node, tx_hash, error),
                };
                let handle = TxHandle::new(tx_hash, sender);
                match self.wait(node, &handle).await {
                    Ok(receipt) => receipt,
                    Err(v) => return v,
                }
            }
        };

        let handle = TxHandle::new(tx_hash, receipt.from);
        let result = match transaction_result(self.chain, &node.id, node.kind(), &handle).await {
            Ok(result) => result,
            Err(error) => return self.unsettled(node, tx_hash, error),
        };

        self.journal.record(&JournalRecord::action_confirmed(
            self.run_id,
            node.id.clone(),
            result.clone(),
            Some(tx_hash),
        ))?;
        Ok(Verification::Adopted(SettledAction {
            result,
            tx_hash: Some(tx_hash),
            receipt: Some(receipt),
        }))
    }

    /// Wait for a transaction found pending; `Err` carries the verdict
    /// when it does not confirm successfully.
    async fn wait(
        &self,
        node: &ActionNode,
        handle: &TxHandle,
    ) -> std::result::Result<Receipt, Result<Verification>> {
        match confirm(self.chain, &node.id, handle, &self.policy).await {
            Ok(receipt) => Ok(receipt),
            Err(IgnisError::TransactionReverted { reason, .. }) => {
                Err(self.reverted(node, handle.hash, Some(reason)))
            }
            Err(error) => Err(self.unsettled(node, handle.hash, error)),
        }
    }

    fn reverted(
        &self,
        node: &ActionNode,
        tx_hash: TxHash,
        reason: Option<String>,
    ) -> Result<Verification> {
        let reason = reason.unwrap_or_else(|| "no reason given".to_string());
        let error = IgnisError::TransactionReverted {
            action_id: node.id.clone(),
            tx_hash,
            reason: reason.clone(),
        };
        self.journal.record(&JournalRecord::action_failed(
            self.run_id,
            node.id.clone(),
            error.to_string(),
            Some(tx_hash),
        ))?;
        Ok(Verification::Retry(format!("transaction {} reverted: {}", tx_hash, reason)))
    }

    /// Record the failure with its hash, so the next run checks it again.
    fn unsettled(
        &self,
        node: &ActionNode,
        tx_hash: TxHash,
        error: IgnisError,
    ) -> Result<Verification> {
        self.journal.record(&JournalRecord::action_failed(
            self.run_id,
            node.id.clone(),
            error.to_string(),
            Some(tx_hash),
        ))?;
        Ok(Verification::Unsettled(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxRequest;
    use crate::testing::MockChain;
    use ignis_core::graph::ActionStatus;
    use ignis_core::journal::JournalConfig;
    use ignis_core::module::{BuildContext, ModuleDefinition, ModuleOutputs, build};
    use ignis_core::types::ModuleId;

    fn entry(status: ActionStatus, result: Option<Value>, tx_hash: Option<TxHash>) -> JournalEntry {
        JournalEntry {
            action_id: ActionId::new(&ModuleId::new("ProxyModule", None), "Box"),
            status,
            result,
            tx_hash,
            error: None,
            run_id: RunId::new(),
            timestamp_ns: 0,
        }
    }

    #[test]
    fn confirmed_entries_are_reused() {
        let hash = TxHash::new([1; 32]);
        let action = RecoveryAction::for_entry(Some(&entry(
            ActionStatus::Confirmed,
            Some(Value::string("0xbox")),
            Some(hash),
        )));
        assert_eq!(
            action,
            RecoveryAction::Reuse {
                result: Value::string("0xbox"),
                tx_hash: Some(hash),
            }
        );
    }

    #[test]
    fn submitted_entries_are_verified() {
        let hash = TxHash::new([2; 32]);
        let submitted = entry(ActionStatus::Submitted, None, Some(hash));
        assert_eq!(
            RecoveryAction::for_entry(Some(&submitted)),
            RecoveryAction::Verify { tx_hash: hash }
        );

        let timed_out = entry(ActionStatus::Failed, None, Some(hash));
        assert_eq!(
            RecoveryAction::for_entry(Some(&timed_out)),
            RecoveryAction::Verify { tx_hash: hash }
        );
    }

    #[test]
    fn failures_without_a_transaction_execute_again() {
        assert_eq!(RecoveryAction::for_entry(None), RecoveryAction::Execute);
        assert_eq!(
            RecoveryAction::for_entry(Some(&entry(ActionStatus::Failed, None, None))),
            RecoveryAction::Execute
        );
    }

    #[tokio::test]
    async fn pending_transaction_without_a_sender_stays_unsettled() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(
            JournalConfig::default()
                .with_directory(dir.path())
                .with_sync(false),
        )
        .unwrap();
        let chain = MockChain::new(1);
        chain.stall_deployments_of("Box");

        let module = ModuleDefinition::new("ProxyModule", |m| {
            let boxed = m.contract("Box", vec![])?;
            Ok(ModuleOutputs::new().with("box", &boxed))
        });
        let graph = build(&module, &BuildContext::new(Vec::new())).unwrap();
        let box_id = ActionId::new(&ModuleId::new("ProxyModule", None), "Box");

        let handle = chain
            .submit(TxRequest::Deploy {
                contract: "Box".to_string(),
                args: vec![],
                value: None,
                from: chain.account_list()[0],
            })
            .await
            .unwrap();
        let earlier = RunId::new();
        journal.record(&JournalRecord::run_started(earlier)).unwrap();
        journal
            .record(&JournalRecord::action_submitted(earlier, box_id.clone(), handle.hash))
            .unwrap();

        let state = journal.load().unwrap();
        let reconciler =
            Reconciler::new(&chain, &journal, ConfirmationPolicy::default(), RunId::new());
        let reconciliation = reconciler.reconcile(&graph, &state).await.unwrap();

        assert!(reconciliation.confirmed.is_empty());
        assert_eq!(reconciliation.failed.len(), 1);
        let (failed_id, error) = &reconciliation.failed[0];
        assert_eq!(failed_id, &box_id);
        assert_eq!(error.code(), "E309");
        assert_eq!(chain.deployments_of("Box"), 1);

        let entry = journal.load().unwrap().get(&box_id).cloned().unwrap();
        assert_eq!(entry.status, ActionStatus::Failed);
        assert_eq!(entry.tx_hash, Some(handle.hash));
    }
}
