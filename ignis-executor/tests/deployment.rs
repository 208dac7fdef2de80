//! Integration tests for building and running deployment modules.

mod common;

use common::{BOX_MODULE, BOX_V2_MODULE, Harness, PROXY_MODULE, action};
use ignis_core::prelude::*;
use ignis_executor::chain::ChainAdapter;
use ignis_executor::loader::ModuleLoader;
use ignis_executor::scheduler::{RunOutcome, TimelineKind};

#[tokio::test]
async fn proxy_module_deploys_and_reads_admin_from_event() {
    let harness = Harness::new();
    let graph = harness.graph(&PROXY_MODULE);
    assert_eq!(graph.len(), 4);

    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(report.executed.len(), 4);

    let proxy = report.output("proxy").and_then(Value::as_address).unwrap();
    let proxy_admin = report
        .output("proxyAdmin")
        .and_then(Value::as_address)
        .unwrap();

    let chain = &harness.chain;
    assert_eq!(chain.contract_name(&proxy).as_deref(), Some("TransparentUpgradeableProxy"));
    assert_eq!(chain.contract_name(&proxy_admin).as_deref(), Some("ProxyAdmin"));
    assert_eq!(chain.admin_of(&proxy), Some(proxy_admin));
    assert_eq!(chain.owner_of(&proxy_admin), Some(chain.account_list()[0]));
    assert_eq!(chain.deployments_of("Box"), 1);
    assert_eq!(chain.submission_count(), 2);
}

#[tokio::test]
async fn event_is_read_only_after_its_source_confirms() {
    let harness = Harness::new();
    let graph = harness.graph(&PROXY_MODULE);
    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);

    let proxy = action("ProxyModule", "TransparentUpgradeableProxy");
    let read = action(
        "ProxyModule",
        "TransparentUpgradeableProxy.AdminChanged.newAdmin.0",
    );
    let confirmed = report.seq_of(&proxy, TimelineKind::Confirmed).unwrap();
    let dispatched = report.seq_of(&read, TimelineKind::Dispatched).unwrap();
    assert!(confirmed < dispatched);
}

/// Deploys the proxy and binds ProxyAdmin to an argument of `event`.
fn admin_from_event(name: &str, event: &'static str, argument: &'static str) -> ModuleDefinition {
    ModuleDefinition::new(name, move |m| {
        let owner = m.get_account(0)?;
        let boxed = m.contract("Box", vec![])?;
        let proxy = m.contract(
            "TransparentUpgradeableProxy",
            vec![
                Argument::from(&boxed),
                Argument::from(&owner),
                Argument::from("0x"),
            ],
        )?;
        let admin = m.read_event_argument(&proxy, event, argument)?;
        let proxy_admin = m.contract_at("ProxyAdmin", &admin)?;
        Ok(ModuleOutputs::new()
            .with("proxyAdmin", &proxy_admin)
            .with("proxy", &proxy))
    })
}

#[tokio::test]
async fn missing_event_fails_the_read_and_blocks_its_dependents() {
    let harness = Harness::new();
    let module = admin_from_event("BeaconModule", "BeaconUpgraded", "beacon");
    let graph = harness.graph(&module);

    let report = harness.executor().run(&graph).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);

    let read = action("BeaconModule", "TransparentUpgradeableProxy.BeaconUpgraded.beacon.0");
    let err = report.failure(&read).unwrap();
    assert_eq!(err.code(), "E303");
    assert!(err.to_string().contains("BeaconUpgraded"), "{}", err);
    assert_eq!(report.blocked, vec![action("BeaconModule", "ProxyAdmin")]);
    assert!(report.is_confirmed(&action("BeaconModule", "TransparentUpgradeableProxy")));
    assert!(report.output("proxyAdmin").is_none());
    assert!(report.output("proxy").is_some());
}

#[tokio::test]
async fn missing_event_argument_fails_the_read_and_blocks_its_dependents() {
    let harness = Harness::new();
    let module = admin_from_event("AdminModule", "AdminChanged", "admin");
    let graph = harness.graph(&module);

    let report = harness.executor().run(&graph).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);

    let read = action("AdminModule", "TransparentUpgradeableProxy.AdminChanged.admin.0");
    let err = report.failure(&read).unwrap();
    assert_eq!(err.code(), "E304");
    assert!(err.to_string().contains("admin"), "{}", err);
    assert_eq!(report.blocked, vec![action("AdminModule", "ProxyAdmin")]);
    assert!(report.is_confirmed(&action("AdminModule", "TransparentUpgradeableProxy")));

    let err = report.into_result().unwrap_err();
    assert_eq!(err.code(), "E304");
}

#[tokio::test]
async fn every_action_waits_for_its_inputs() {
    let harness = Harness::new();
    let graph = harness.graph(&BOX_V2_MODULE);
    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);

    for node in graph.nodes() {
        let dispatched = report.seq_of(&node.id, TimelineKind::Dispatched).unwrap();
        for input in node.inputs() {
            let Some(producer) = graph.future(input).and_then(Future::producer) else {
                continue;
            };
            let confirmed = report.seq_of(producer, TimelineKind::Confirmed).unwrap();
            assert!(
                confirmed < dispatched,
                "{} dispatched before its input {} confirmed",
                node.id,
                producer
            );
        }
    }
}

#[tokio::test]
async fn upgrade_switches_the_proxy_implementation() {
    let harness = Harness::new();
    let graph = harness.graph(&BOX_V2_MODULE);
    assert_eq!(graph.len(), 9);

    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);

    let chain = &harness.chain;
    let proxy = report.output("box").and_then(Value::as_address).unwrap();
    let implementation = chain.implementation_of(&proxy).unwrap();
    assert_eq!(chain.contract_name(&implementation).as_deref(), Some("BoxV2"));
    assert_eq!(chain.calls_to("upgradeAndCall"), 1);

    let upgrade = action("UpgradeModule", "ProxyAdmin.upgradeAndCall");
    assert!(report.is_confirmed(&upgrade));
}

#[tokio::test]
async fn shared_modules_deploy_once() {
    let harness = Harness::new();
    let graph = harness.graph(&BOX_V2_MODULE);
    assert_eq!(graph.count_kind(ActionKind::Deploy), 3);

    let report = harness.executor().run(&graph).await.unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(harness.chain.deployments_of("Box"), 1);
    assert_eq!(harness.chain.deployments_of("TransparentUpgradeableProxy"), 1);
    assert_eq!(harness.chain.deployments_of("BoxV2"), 1);
}

#[test]
fn action_ids_are_stable_across_builds() {
    let harness = Harness::new();
    let first = harness.graph(&BOX_V2_MODULE);
    let second = harness.graph(&BOX_V2_MODULE);

    assert_eq!(first.topological_order(), second.topological_order());
    assert!(first.contains(&action("ProxyModule", "Box")));
    assert!(first.contains(&action("BoxModule", "Box")));
    assert!(first.contains(&action("UpgradeModule", "BoxV2.encodeFunctionCall(increment)")));
}

#[tokio::test]
async fn cyclic_modules_are_rejected_before_anything_runs() {
    let cyclic = ModuleDefinition::new("Cyclic", |m| {
        let later = m.reference("B", FutureKind::ContractHandle);
        let a = m.contract("A", vec![Argument::from(&later)])?;
        m.contract("B", vec![Argument::from(&a)])?;
        Ok(ModuleOutputs::new())
    });

    let harness = Harness::new();
    let err = harness
        .executor()
        .deploy(&cyclic, BuildContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, IgnisError::CyclicGraph { .. }), "{}", err);
    assert_eq!(harness.chain.submission_count(), 0);
    assert!(harness.journal.load().unwrap().is_empty());
}

#[tokio::test]
async fn deploy_fetches_accounts_from_the_chain() {
    let harness = Harness::new();
    let executor = harness.executor();

    let report = ignis_executor::deploy(&BOX_MODULE, &executor).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    let outputs = report.into_result().unwrap();
    assert_eq!(outputs.get("box"), outputs.get("proxy"));
}

#[tokio::test]
async fn yaml_manifest_deploys_like_code() {
    let manifest = ModuleLoader::load_str(
        r#"
modules:
  - name: ProxyModule
    actions:
      - op: contract
        contract: Box
      - op: contract
        contract: TransparentUpgradeableProxy
        args: ["${Box}", "${accounts.0}", "0x"]
      - op: read_event_argument
        source: "${TransparentUpgradeableProxy}"
        event: AdminChanged
        argument: newAdmin
        as: proxyAdminAddress
      - op: contract_at
        contract: ProxyAdmin
        address: "${proxyAdminAddress}"
    outputs:
      proxyAdmin: "${ProxyAdmin}"
      proxy: "${TransparentUpgradeableProxy}"
"#,
    )
    .unwrap();

    let harness = Harness::new();
    let report = harness
        .executor()
        .deploy(manifest.root(), BuildContext::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{}", report);

    let proxy = report.output("proxy").and_then(Value::as_address).unwrap();
    let proxy_admin = report.output("proxyAdmin").and_then(Value::as_address);
    assert_eq!(harness.chain.admin_of(&proxy), proxy_admin);
}

#[tokio::test]
async fn encoded_calls_are_passed_to_the_upgrade() {
    let harness = Harness::new();
    let graph = harness.graph(&BOX_V2_MODULE);
    harness.executor().run(&graph).await.unwrap();

    let encoded = harness
        .journal
        .load()
        .unwrap()
        .get(&action("UpgradeModule", "BoxV2.encodeFunctionCall(increment)"))
        .and_then(|e| e.result.clone())
        .unwrap();
    let expected = harness.chain.encode_call("BoxV2", "increment", &[]).unwrap();
    assert_eq!(encoded, expected);
}
