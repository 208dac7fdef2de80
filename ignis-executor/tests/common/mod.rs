//! Common test utilities for integration tests.

#![allow(dead_code)]

use ignis_core::prelude::*;
use ignis_executor::scheduler::{ConfirmationPolicy, Executor, ExecutorConfig};
use ignis_executor::testing::MockChain;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tempfile::TempDir;

/// Box behind a transparent proxy, with its ProxyAdmin read from the
/// proxy's `AdminChanged` event.
pub static PROXY_MODULE: LazyLock<ModuleDefinition> = LazyLock::new(|| {
    ModuleDefinition::new("ProxyModule", |m| {
        let proxy_admin_owner = m.get_account(0)?;

        let boxed = m.contract("Box", vec![])?;
        let proxy = m.contract(
            "TransparentUpgradeableProxy",
            vec![
                Argument::from(&boxed),
                Argument::from(&proxy_admin_owner),
                Argument::from("0x"),
            ],
        )?;

        let proxy_admin_address = m.read_event_argument(&proxy, "AdminChanged", "newAdmin")?;
        let proxy_admin = m.contract_at("ProxyAdmin", &proxy_admin_address)?;

        Ok(ModuleOutputs::new()
            .with("proxyAdmin", &proxy_admin)
            .with("proxy", &proxy))
    })
});

/// The proxy, bound with the Box interface.
pub static BOX_MODULE: LazyLock<ModuleDefinition> = LazyLock::new(|| {
    ModuleDefinition::new("BoxModule", |m| {
        let proxy = m.use_module(&PROXY_MODULE)?;
        let proxy_address = proxy.require("proxy")?;
        let proxy_admin = proxy.require("proxyAdmin")?;

        let boxed = m.contract_at("Box", &proxy_address)?;

        Ok(ModuleOutputs::new()
            .with("box", &boxed)
            .with("proxy", &proxy_address)
            .with("proxyAdmin", &proxy_admin))
    })
});

/// Upgrades the proxy to BoxV2 through its ProxyAdmin.
pub static UPGRADE_MODULE: LazyLock<ModuleDefinition> = LazyLock::new(|| {
    ModuleDefinition::new("UpgradeModule", |m| {
        let proxy_admin_owner = m.get_account(0)?;

        let base = m.use_module(&BOX_MODULE)?;
        let proxy_admin = base.require("proxyAdmin")?;
        let proxy = base.require("proxy")?;

        let box_v2 = m.contract("BoxV2", vec![])?;
        let encoded = m.encode_function_call(&box_v2, "increment", vec![])?;

        m.call_with(
            &proxy_admin,
            "upgradeAndCall",
            vec![
                Argument::from(&proxy),
                Argument::from(&box_v2),
                Argument::from(&encoded),
            ],
            ActionOptions::new().from(&proxy_admin_owner),
        )?;

        Ok(ModuleOutputs::new()
            .with("proxyAdmin", &proxy_admin)
            .with("proxy", &proxy))
    })
});

/// The upgraded proxy, bound with the BoxV2 interface.
pub static BOX_V2_MODULE: LazyLock<ModuleDefinition> = LazyLock::new(|| {
    ModuleDefinition::new("BoxV2Module", |m| {
        let upgraded = m.use_module(&UPGRADE_MODULE)?;
        let proxy = upgraded.require("proxy")?;

        let boxed = m.contract_at("BoxV2", &proxy)?;

        Ok(ModuleOutputs::new().with("box", &boxed))
    })
});

/// Action id of `local` in an unparameterized module.
pub fn action(module: &str, local: &str) -> ActionId {
    ActionId::new(&ModuleId::new(module, None), local)
}

/// Fast confirmation settings for tests.
pub fn fast_policy() -> ConfirmationPolicy {
    ConfirmationPolicy::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_secs(5))
}

/// Executor config with fast polling.
pub fn test_config() -> ExecutorConfig {
    ExecutorConfig::default().with_confirmation(fast_policy())
}

/// Open the journal in `dir`. Only one handle per directory may be open.
pub fn open_journal(dir: &Path) -> Arc<Journal> {
    Arc::new(Journal::open(JournalConfig::default().with_directory(dir).with_sync(false)).unwrap())
}

/// A mock chain and a journal in a temp directory.
pub struct Harness {
    pub chain: Arc<MockChain>,
    pub journal: Arc<Journal>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_chain(MockChain::new(4))
    }

    pub fn with_chain(chain: MockChain) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let journal = open_journal(dir.path());
        Self {
            chain: Arc::new(chain),
            journal,
            dir,
        }
    }

    pub fn executor(&self) -> Executor {
        self.executor_with(test_config())
    }

    pub fn executor_with(&self, config: ExecutorConfig) -> Executor {
        Executor::new(config, self.chain.clone(), Arc::clone(&self.journal))
    }

    pub fn context(&self) -> BuildContext {
        BuildContext::new(self.chain.account_list().to_vec())
    }

    pub fn graph(&self, definition: &ModuleDefinition) -> DeploymentGraph {
        build(definition, &self.context()).unwrap()
    }
}
