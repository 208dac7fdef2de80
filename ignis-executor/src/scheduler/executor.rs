//! Deployment execution engine.
//!
//! This module drives a [`DeploymentGraph`] to completion against a chain,
//! with **concurrent, dependency-ordered dispatch**. Actions run as soon as
//! every future they read is resolved, up to a configurable limit.
//!
//! ## Architecture
//!
//! One loop owns all run state. Workers only talk to the chain:
//! 1. Reconcile the journal: seed confirmed actions, verify unconfirmed
//!    transactions on chain
//! 2. Find ready actions (pending, inputs resolved, sender idle)
//! 3. Spawn a worker per ready action, up to `max_concurrent_actions`
//! 4. Journal `Submitted` as workers report broadcasts
//! 5. On completion, journal the outcome, resolve the produced future and
//!    repeat
//!
//! ## Ordering
//!
//! - An action is dispatched only after every action it reads from has
//!   confirmed and been journaled
//! - At most one transaction per sender is in flight, so nonces are used
//!   in submission order
//! - A failure blocks the actions downstream of it; independent branches
//!   keep running unless `fail_fast` is set
//!
//! All public methods are instrumented with tracing spans.

use super::config::ExecutorConfig;
use super::report::{RunOutcome, RunReport};
use super::state::RunState;
use super::work::{self, Outcome, Progress};
use crate::chain::ChainAdapter;
use crate::recovery::Reconciler;
use ignis_core::error::{IgnisError, Result};
use ignis_core::graph::{ActionKind, DeploymentGraph};
use ignis_core::journal::{Journal, JournalRecord};
use ignis_core::module::{BuildContext, ModuleDefinition, build};
use ignis_core::types::{ActionId, Address, RunId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{Instrument, instrument};

/// Cooperative cancellation for a run.
///
/// Cancelling stops new dispatches. Transactions already broadcast are
/// awaited and journaled before the run returns.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Create a handle that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The main execution engine.
///
/// An executor pairs a chain adapter with a journal. Running the same graph
/// twice against the same journal submits nothing the second time.
pub struct Executor {
    config: ExecutorConfig,
    chain: Arc<dyn ChainAdapter>,
    journal: Arc<Journal>,
}

impl Executor {
    /// Create a new executor.
    pub fn new(config: ExecutorConfig, chain: Arc<dyn ChainAdapter>, journal: Arc<Journal>) -> Self {
        Self {
            config,
            chain,
            journal,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The chain adapter.
    pub fn chain(&self) -> &Arc<dyn ChainAdapter> {
        &self.chain
    }

    /// The journal.
    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    /// Build `definition` with the chain's accounts and run it.
    ///
    /// Accounts already present in `context` are kept; otherwise they are
    /// fetched from the adapter. Build errors are returned before anything
    /// is journaled or submitted.
    #[instrument(skip(self, definition, context), fields(module = %definition.name()))]
    pub async fn deploy(
        &self,
        definition: &ModuleDefinition,
        context: BuildContext,
    ) -> Result<RunReport> {
        let context = if context.accounts().is_empty() {
            let accounts = self
                .chain
                .accounts()
                .await
                .map_err(|e| IgnisError::ConfigValue {
                    field: "accounts".to_string(),
                    cause: e.to_string(),
                })?;
            context.with_accounts(accounts)
        } else {
            context
        };

        let graph = build(definition, &context)?;
        self.run(&graph).await
    }

    /// Run a graph to completion.
    pub async fn run(&self, graph: &DeploymentGraph) -> Result<RunReport> {
        self.run_with_cancel(graph, &CancelHandle::new()).await
    }

    /// Run a graph, stopping early if `cancel` fires.
    ///
    /// Returns `Err` only for journal failures; action failures are in the
    /// report.
    #[instrument(
        skip(self, graph, cancel),
        fields(
            root = %graph.root(),
            actions = graph.len(),
            max_concurrent = self.config.max_concurrent_actions,
            run_id = tracing::field::Empty,
        )
    )]
    pub async fn run_with_cancel(
        &self,
        graph: &DeploymentGraph,
        cancel: &CancelHandle,
    ) -> Result<RunReport> {
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let journal_state = self.journal.load()?;
        self.journal.record(&JournalRecord::run_started(run_id))?;

        let default_sender = self.default_sender(graph).await;
        let mut state = RunState::new(run_id, graph);

        let reconciliation = Reconciler::new(
            self.chain.as_ref(),
            &self.journal,
            self.config.confirmation,
            run_id,
        )
        .with_default_sender(default_sender)
        .reconcile(graph, &journal_state)
        .await?;

        for (action_id, settled) in reconciliation.confirmed {
            if let Some(node) = graph.node(&action_id) {
                state.seed(node, settled.result, settled.tx_hash, settled.receipt)?;
            }
        }
        for (action_id, error) in reconciliation.failed {
            state.mark_failed(&action_id, error);
        }

        tracing::info!(
            run_id = %run_id,
            reused = state.reused.len(),
            "Starting run"
        );

        let cancelled = self.drive(graph, &mut state, cancel, default_sender).await?;

        let (blocked, pending) = state.leftovers(graph);
        let outcome = if !state.failures.is_empty() {
            RunOutcome::Failed
        } else if state.all_confirmed() {
            RunOutcome::Completed
        } else if cancelled {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Failed
        };

        let closing = match outcome {
            RunOutcome::Completed => JournalRecord::run_completed(run_id),
            RunOutcome::Cancelled => JournalRecord::run_cancelled(run_id),
            RunOutcome::Failed => JournalRecord::run_failed(
                run_id,
                format!(
                    "{} failed, {} blocked, {} pending",
                    state.failures.len(),
                    blocked.len(),
                    pending.len()
                ),
            ),
        };
        self.journal.record(&closing)?;

        let report = RunReport {
            run_id,
            outcome,
            outputs: state.outputs(graph),
            reused: std::mem::take(&mut state.reused),
            executed: std::mem::take(&mut state.executed),
            failures: std::mem::take(&mut state.failures),
            blocked,
            pending,
            timeline: std::mem::take(&mut state.timeline),
            reconciliation: reconciliation.report,
        };

        match report.outcome {
            RunOutcome::Completed => tracing::info!(report = %report, "Run completed"),
            _ => tracing::warn!(report = %report, "Run did not complete"),
        }
        Ok(report)
    }

    /// The dispatch loop. Returns whether the run was cancelled.
    async fn drive(
        &self,
        graph: &DeploymentGraph,
        state: &mut RunState,
        cancel: &CancelHandle,
        default_sender: Option<Address>,
    ) -> Result<bool> {
        let order = graph.topological_order();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_actions));
        let mut tasks: JoinSet<Outcome> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, ActionId> = HashMap::new();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<Progress>();
        let mut cancelled = false;
        let mut halted = false;

        loop {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                tracing::info!(in_flight = tasks.len(), "Cancellation requested, draining in-flight actions");
            }

            if !cancelled && !halted {
                for action_id in &order {
                    let Some(node) = graph.node(action_id) else {
                        continue;
                    };
                    if !state.is_ready(node) {
                        continue;
                    }

                    let sender = match work::sender_of(node, &state.futures, default_sender) {
                        Ok(sender) => sender,
                        Err(error) => {
                            self.fail(state, action_id, None, error)?;
                            halted |= self.config.fail_fast;
                            continue;
                        }
                    };
                    if sender.is_some_and(|s| state.sender_busy(&s)) {
                        continue;
                    }

                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                        break;
                    };

                    let work = match work::prepare(graph, state, node, sender) {
                        Ok(work) => work,
                        Err(error) => {
                            drop(permit);
                            self.fail(state, action_id, None, error)?;
                            halted |= self.config.fail_fast;
                            continue;
                        }
                    };

                    state.mark_dispatched(action_id, sender);
                    tracing::debug!(action_id = %action_id, kind = %node.kind(), "Dispatching action");

                    let span = tracing::info_span!(
                        "action",
                        action_id = %action_id,
                        kind = %node.kind(),
                        module = %node.module,
                    );
                    let chain = Arc::clone(&self.chain);
                    let policy = self.config.confirmation;
                    let progress = progress_tx.clone();
                    let id = action_id.clone();
                    let handle = tasks.spawn(
                        async move {
                            let _permit = permit;
                            work::perform(chain, policy, id, work, progress).await
                        }
                        .instrument(span),
                    );
                    in_flight.insert(handle.id(), action_id.clone());
                }
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                Some(progress) = progress_rx.recv() => {
                    self.on_progress(state, progress)?;
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    // Submissions reported before the task ended are journaled first.
                    while let Ok(progress) = progress_rx.try_recv() {
                        self.on_progress(state, progress)?;
                    }

                    match joined {
                        Ok(outcome) => {
                            in_flight.retain(|_, a| a != &outcome.action_id);
                            if !self.on_outcome(graph, state, outcome)? {
                                halted |= self.config.fail_fast;
                            }
                        }
                        Err(join_error) => {
                            let Some(action_id) = in_flight.remove(&join_error.id()) else {
                                continue;
                            };
                            let tx_hash = state.tx_hashes.get(&action_id).copied();
                            let error = IgnisError::Chain {
                                action_id: action_id.clone(),
                                cause: if join_error.is_panic() {
                                    "action task panicked".to_string()
                                } else {
                                    "action task was cancelled".to_string()
                                },
                            };
                            self.fail(state, &action_id, tx_hash, error)?;
                            halted |= self.config.fail_fast;
                        }
                    }
                }
            }
        }

        Ok(cancelled)
    }

    fn on_progress(&self, state: &mut RunState, progress: Progress) -> Result<()> {
        match progress {
            Progress::Submitted { action_id, handle } => {
                self.journal.record(&JournalRecord::action_submitted(
                    state.run_id,
                    action_id.clone(),
                    handle.hash,
                ))?;
                state.mark_submitted(&action_id, handle.hash);
                tracing::info!(action_id = %action_id, tx_hash = %handle.hash, from = %handle.from, "Transaction submitted");
            }
        }
        Ok(())
    }

    /// Journal and apply a worker's result. Returns whether it confirmed.
    fn on_outcome(
        &self,
        graph: &DeploymentGraph,
        state: &mut RunState,
        outcome: Outcome,
    ) -> Result<bool> {
        let Some(node) = graph.node(&outcome.action_id) else {
            return Ok(false);
        };

        match outcome.result {
            Ok(completed) => {
                self.journal.record(&JournalRecord::action_confirmed(
                    state.run_id,
                    node.id.clone(),
                    completed.value.clone(),
                    outcome.tx_hash,
                ))?;
                tracing::info!(action_id = %node.id, result = %completed.value, "Action confirmed");
                state.mark_confirmed(node, completed.value, completed.receipt)?;
                Ok(true)
            }
            Err(error) => {
                self.fail(state, &node.id, outcome.tx_hash, error)?;
                Ok(false)
            }
        }
    }

    fn fail(
        &self,
        state: &mut RunState,
        action_id: &ActionId,
        tx_hash: Option<ignis_core::types::TxHash>,
        error: IgnisError,
    ) -> Result<()> {
        self.journal.record(&JournalRecord::action_failed(
            state.run_id,
            action_id.clone(),
            error.to_string(),
            tx_hash,
        ))?;
        tracing::warn!(action_id = %action_id, code = error.code(), error = %error, "Action failed");
        state.mark_failed(action_id, error);
        Ok(())
    }

    /// First chain account, when the graph sends any transaction.
    async fn default_sender(&self, graph: &DeploymentGraph) -> Option<Address> {
        let sends = graph.count_kind(ActionKind::Deploy) + graph.count_kind(ActionKind::Call);
        if sends == 0 {
            return None;
        }
        match self.chain.accounts().await {
            Ok(accounts) => accounts.first().copied(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not fetch accounts; actions without a sender will fail");
                None
            }
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("journal", &self.journal)
            .finish()
    }
}
