//! Integration tests for concurrent dispatch, sender ordering and failure
//! handling.

mod common;

use common::{BOX_MODULE, Harness, PROXY_MODULE, action, test_config};
use ignis_core::prelude::*;
use ignis_executor::scheduler::{CancelHandle, RunOutcome};
use ignis_executor::testing::MockChain;
use std::time::Duration;

const CONTRACTS: [&str; 4] = ["Alpha", "Beta", "Gamma", "Delta"];

/// Four independent deployments, all from the default account.
fn single_sender_module() -> ModuleDefinition {
    ModuleDefinition::new("SingleSender", |m| {
        let mut outputs = ModuleOutputs::new();
        for name in CONTRACTS {
            let deployed = m.contract(name, vec![])?;
            outputs.insert(name, deployed);
        }
        Ok(outputs)
    })
}

/// Four independent deployments, each from its own account.
fn many_senders_module() -> ModuleDefinition {
    ModuleDefinition::new("ManySenders", |m| {
        let mut outputs = ModuleOutputs::new();
        for (i, name) in CONTRACTS.into_iter().enumerate() {
            let account = m.get_account(i)?;
            let deployed = m.contract_with(name, vec![], ActionOptions::new().from(&account))?;
            outputs.insert(name, deployed);
        }
        Ok(outputs)
    })
}

/// `Vault` depends on `Box`; `Token` depends on nothing.
fn branching_module() -> ModuleDefinition {
    ModuleDefinition::new("Branching", |m| {
        let boxed = m.contract("Box", vec![])?;
        let token = m.contract("Token", vec![])?;
        let vault = m.contract("Vault", vec![Argument::from(&boxed)])?;
        Ok(ModuleOutputs::new()
            .with("token", &token)
            .with("vault", &vault))
    })
}

fn slow_harness() -> Harness {
    Harness::with_chain(MockChain::new(4).with_latency(Duration::from_millis(30)))
}

#[tokio::test]
async fn one_transaction_in_flight_per_sender() {
    let harness = slow_harness();
    let graph = harness.graph(&single_sender_module());

    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(harness.chain.max_in_flight_per_sender(), 1);
    assert_eq!(harness.chain.max_in_flight(), 1);
}

#[tokio::test]
async fn independent_senders_run_concurrently() {
    let harness = slow_harness();
    let graph = harness.graph(&many_senders_module());

    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(harness.chain.max_in_flight(), 4);
    assert_eq!(harness.chain.max_in_flight_per_sender(), 1);
}

#[tokio::test]
async fn concurrency_limit_is_respected() {
    let harness = slow_harness();
    let graph = harness.graph(&many_senders_module());

    let report = harness
        .executor_with(test_config().with_max_concurrent_actions(2))
        .run(&graph)
        .await
        .unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(harness.chain.max_in_flight(), 2);
}

#[tokio::test]
async fn failure_blocks_only_its_dependents() {
    let harness = Harness::new();
    let graph = harness.graph(&branching_module());
    harness.chain.reject_deployments_of("Box");

    let report = harness.executor().run(&graph).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(report.is_confirmed(&action("Branching", "Token")));
    assert_eq!(report.blocked, vec![action("Branching", "Vault")]);
    assert!(report.pending.is_empty());
    assert!(report.output("token").is_some());
    assert!(report.output("vault").is_none());

    let err = report.into_result().unwrap_err();
    assert_eq!(err.code(), "E301");
}

#[tokio::test]
async fn failing_module_does_not_stop_an_independent_one() {
    let broken = ModuleDefinition::new("X", |m| {
        let deployed = m.contract("Broken", vec![])?;
        Ok(ModuleOutputs::new().with("broken", &deployed))
    });
    let healthy = ModuleDefinition::new("Y", |m| {
        let deployed = m.contract("Healthy", vec![])?;
        Ok(ModuleOutputs::new().with("healthy", &deployed))
    });
    let root = ModuleDefinition::new("Both", move |m| {
        m.use_module(&broken)?;
        let y = m.use_module(&healthy)?;
        Ok(ModuleOutputs::new().with("healthy", &y.require("healthy")?))
    });

    let harness = Harness::new();
    let graph = harness.graph(&root);
    harness.chain.reject_deployments_of("Broken");

    let report = harness.executor().run(&graph).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].action_id, action("X", "Broken"));
    assert_eq!(report.executed, vec![action("Y", "Healthy")]);
    assert!(report.output("healthy").is_some());
}

#[tokio::test]
async fn fail_fast_stops_dispatching() {
    let harness = Harness::new();
    let graph = harness.graph(&branching_module());
    harness.chain.reject_deployments_of("Box");

    let report = harness
        .executor_with(test_config().with_fail_fast(true))
        .run(&graph)
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.blocked, vec![action("Branching", "Vault")]);
    assert_eq!(report.pending, vec![action("Branching", "Token")]);
    assert_eq!(harness.chain.submission_count(), 0);
}

#[tokio::test]
async fn cancelled_before_start_submits_nothing() {
    let harness = Harness::new();
    let graph = harness.graph(&PROXY_MODULE);
    let cancel = CancelHandle::new();
    cancel.cancel();

    let report = harness
        .executor()
        .run_with_cancel(&graph, &cancel)
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.pending.len(), graph.len());
    assert_eq!(harness.chain.submission_count(), 0);

    let err = report.into_result().unwrap_err();
    assert_eq!(err.code(), "E306");
}

#[tokio::test]
async fn cancellation_waits_for_in_flight_work() {
    let harness = Harness::with_chain(MockChain::new(2).with_latency(Duration::from_millis(100)));
    let graph = harness.graph(&PROXY_MODULE);
    let executor = harness.executor();
    let cancel = CancelHandle::new();

    let trigger = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    };
    let (report, ()) = tokio::join!(executor.run_with_cancel(&graph, &cancel), trigger);
    let report = report.unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.executed, vec![action("ProxyModule", "Box")]);
    assert_eq!(report.pending.len(), 3);

    let entry = harness.journal.load().unwrap();
    assert!(entry.get(&action("ProxyModule", "Box")).unwrap().is_confirmed());

    // Resuming picks up where the cancelled run stopped.
    let resumed = executor.run(&graph).await.unwrap();
    assert!(resumed.is_success(), "{}", resumed);
    assert_eq!(harness.chain.deployments_of("Box"), 1);
}

#[tokio::test]
async fn unauthorized_upgrade_reverts() {
    let stranger_upgrade = ModuleDefinition::new("StrangerUpgrade", |m| {
        let stranger = m.get_account(1)?;
        let base = m.use_module(&BOX_MODULE)?;
        let proxy_admin = base.require("proxyAdmin")?;
        let proxy = base.require("proxy")?;
        let box_v2 = m.contract("BoxV2", vec![])?;

        m.call_with(
            &proxy_admin,
            "upgradeAndCall",
            vec![
                Argument::from(&proxy),
                Argument::from(&box_v2),
                Argument::from("0x"),
            ],
            ActionOptions::new().from(&stranger),
        )?;
        Ok(ModuleOutputs::new().with("proxy", &proxy))
    });

    let harness = Harness::new();
    let graph = harness.graph(&stranger_upgrade);
    let report = harness.executor().run(&graph).await.unwrap();

    let upgrade = action("StrangerUpgrade", "ProxyAdmin.upgradeAndCall");
    let err = report.failure(&upgrade).unwrap();
    assert_eq!(err.code(), "E305");
    assert!(err.to_string().contains("OwnableUnauthorizedAccount"), "{}", err);

    let proxy = report.output("proxy").and_then(Value::as_address).unwrap();
    let implementation = harness.chain.implementation_of(&proxy).unwrap();
    assert_eq!(harness.chain.contract_name(&implementation).as_deref(), Some("Box"));
}
