//! Integration tests for resuming deployments from the journal.

mod common;

use common::{BOX_V2_MODULE, Harness, PROXY_MODULE, UPGRADE_MODULE, action, fast_policy, open_journal, test_config};
use ignis_core::prelude::*;
use ignis_executor::scheduler::{Executor, ExecutorConfig, RunOutcome};
use ignis_executor::testing::MockChain;
use std::sync::Arc;
use std::time::Duration;

fn short_timeout() -> ExecutorConfig {
    test_config().with_confirmation(fast_policy().with_timeout(Duration::from_millis(100)))
}

fn proxy_id() -> ActionId {
    action("ProxyModule", "TransparentUpgradeableProxy")
}

#[tokio::test]
async fn second_run_submits_nothing() {
    let harness = Harness::new();
    let graph = harness.graph(&BOX_V2_MODULE);

    let first = harness.executor().run(&graph).await.unwrap();
    assert!(first.is_success(), "{}", first);
    let submissions = harness.chain.submission_count();

    let second = harness.executor().run(&graph).await.unwrap();
    assert!(second.is_success(), "{}", second);
    assert_eq!(harness.chain.submission_count(), submissions);
    assert_eq!(second.reused.len(), graph.len());
    assert!(second.executed.is_empty());
    assert_eq!(second.outputs, first.outputs);
    assert_eq!(second.reconciliation.reused.len(), graph.len());
}

#[tokio::test]
async fn resumes_after_a_rejected_submission() {
    let harness = Harness::new();
    let graph = harness.graph(&PROXY_MODULE);
    harness.chain.reject_deployments_of("TransparentUpgradeableProxy");

    let failed = harness.executor().run(&graph).await.unwrap();
    assert_eq!(failed.outcome, RunOutcome::Failed);
    assert!(failed.is_confirmed(&action("ProxyModule", "Box")));
    assert_eq!(failed.failure(&proxy_id()).map(IgnisError::code), Some("E301"));
    assert_eq!(failed.blocked.len(), 2);
    assert!(failed.output("proxy").is_none());

    harness.chain.clear_faults();
    let resumed = harness.executor().run(&graph).await.unwrap();
    assert!(resumed.is_success(), "{}", resumed);
    assert_eq!(resumed.reused, vec![action("ProxyModule", "Box")]);
    assert_eq!(harness.chain.deployments_of("Box"), 1);
    assert_eq!(harness.chain.deployments_of("TransparentUpgradeableProxy"), 1);
}

#[tokio::test]
async fn resumes_across_a_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::new(2));
    let graph = build(&BOX_V2_MODULE, &BuildContext::new(chain.account_list().to_vec())).unwrap();
    chain.reject_calls_to("upgradeAndCall");

    {
        let executor = Executor::new(test_config(), chain.clone(), open_journal(dir.path()));
        let report = executor.run(&graph).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.executed.len(), 8);
        assert_eq!(report.failures.len(), 1);
    }

    chain.clear_faults();
    let executor = Executor::new(test_config(), chain.clone(), open_journal(dir.path()));
    let report = executor.run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(report.reused.len(), 8);
    assert_eq!(report.executed, vec![action("UpgradeModule", "ProxyAdmin.upgradeAndCall")]);
    assert_eq!(chain.deployments_of("Box"), 1);
    assert_eq!(chain.deployments_of("BoxV2"), 1);
    assert_eq!(chain.calls_to("upgradeAndCall"), 1);
    assert_eq!(executor.journal().load().unwrap().runs().len(), 2);
}

#[tokio::test]
async fn journaled_results_seed_the_run() {
    let harness = Harness::new();
    let earlier = RunId::new();
    let implementation = Address::new([7; 20]);
    harness.journal.record(&JournalRecord::run_started(earlier)).unwrap();
    harness
        .journal
        .record(&JournalRecord::action_confirmed(
            earlier,
            action("ProxyModule", "Box"),
            Value::address(implementation),
            None,
        ))
        .unwrap();

    let graph = harness.graph(&PROXY_MODULE);
    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(harness.chain.deployments_of("Box"), 0);

    let proxy = report.output("proxy").and_then(Value::as_address).unwrap();
    assert_eq!(harness.chain.implementation_of(&proxy), Some(implementation));
}

#[tokio::test]
async fn mined_transaction_from_a_timed_out_run_is_adopted() {
    let harness = Harness::new();
    let graph = harness.graph(&PROXY_MODULE);
    harness.chain.stall_deployments_of("TransparentUpgradeableProxy");

    let timed_out = harness.executor_with(short_timeout()).run(&graph).await.unwrap();
    assert_eq!(timed_out.outcome, RunOutcome::Failed);
    assert_eq!(timed_out.failure(&proxy_id()).map(IgnisError::code), Some("E302"));

    let entry = harness.journal.load().unwrap().get(&proxy_id()).cloned().unwrap();
    assert_eq!(entry.status, ActionStatus::Failed);
    let hash = entry.tx_hash.unwrap();

    harness.chain.clear_faults();
    harness.chain.release_stalled();

    let resumed = harness.executor().run(&graph).await.unwrap();
    assert!(resumed.is_success(), "{}", resumed);
    assert_eq!(resumed.reconciliation.verified, vec![(proxy_id(), hash)]);
    assert!(resumed.reused.contains(&proxy_id()));
    assert_eq!(harness.chain.deployments_of("TransparentUpgradeableProxy"), 1);

    let entry = harness.journal.load().unwrap().get(&proxy_id()).cloned().unwrap();
    assert!(entry.is_confirmed());
    assert_eq!(entry.tx_hash, Some(hash));
}

#[tokio::test]
async fn still_pending_transaction_is_not_resubmitted() {
    let harness = Harness::new();
    let graph = harness.graph(&PROXY_MODULE);
    harness.chain.stall_deployments_of("TransparentUpgradeableProxy");

    harness.executor_with(short_timeout()).run(&graph).await.unwrap();
    let again = harness.executor_with(short_timeout()).run(&graph).await.unwrap();

    assert_eq!(again.outcome, RunOutcome::Failed);
    assert_eq!(again.failure(&proxy_id()).map(IgnisError::code), Some("E302"));
    assert_eq!(again.reconciliation.failures.len(), 1);
    assert_eq!(harness.chain.deployments_of("TransparentUpgradeableProxy"), 1);
}

#[tokio::test]
async fn dropped_transaction_is_resubmitted() {
    let harness = Harness::new();
    let graph = harness.graph(&PROXY_MODULE);
    harness.chain.stall_deployments_of("TransparentUpgradeableProxy");

    harness.executor_with(short_timeout()).run(&graph).await.unwrap();
    let hash = harness
        .journal
        .load()
        .unwrap()
        .get(&proxy_id())
        .and_then(|e| e.tx_hash)
        .unwrap();

    harness.chain.forget_transaction(&hash);
    harness.chain.clear_faults();

    let resumed = harness.executor().run(&graph).await.unwrap();
    assert!(resumed.is_success(), "{}", resumed);
    assert_eq!(resumed.reconciliation.retried.len(), 1);
    assert_eq!(resumed.reconciliation.retried[0].0, proxy_id());
    assert!(resumed.executed.contains(&proxy_id()));
    assert_eq!(harness.chain.deployments_of("TransparentUpgradeableProxy"), 2);
}

#[tokio::test]
async fn reverted_call_is_retried() {
    let harness = Harness::new();
    let graph = harness.graph(&UPGRADE_MODULE);
    let upgrade = action("UpgradeModule", "ProxyAdmin.upgradeAndCall");
    harness.chain.revert_calls_to("upgradeAndCall");

    let failed = harness.executor().run(&graph).await.unwrap();
    assert_eq!(failed.failure(&upgrade).map(IgnisError::code), Some("E305"));

    harness.chain.clear_faults();
    let resumed = harness.executor().run(&graph).await.unwrap();
    assert!(resumed.is_success(), "{}", resumed);
    assert_eq!(resumed.executed, vec![upgrade]);
    assert_eq!(harness.chain.calls_to("upgradeAndCall"), 2);
}

#[tokio::test]
async fn entries_outside_the_graph_are_reported() {
    let harness = Harness::new();
    let earlier = RunId::new();
    let gone = action("RemovedModule", "Thing");
    harness.journal.record(&JournalRecord::run_started(earlier)).unwrap();
    harness
        .journal
        .record(&JournalRecord::action_confirmed(
            earlier,
            gone.clone(),
            Value::address(Address::new([9; 20])),
            None,
        ))
        .unwrap();

    let graph = harness.graph(&PROXY_MODULE);
    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(report.reconciliation.unknown, vec![gone]);
}
