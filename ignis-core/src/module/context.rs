use crate::types::Address;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Inputs available to every module while the graph is built.
///
/// Accounts are the signer addresses reported by the chain. Parameters are
/// supplied per module name, like a deployment parameters file.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    accounts: Vec<Address>,
    parameters: HashMap<String, BTreeMap<String, Value>>,
}

impl BuildContext {
    /// Create a context with the given accounts and no parameters.
    pub fn new(accounts: Vec<Address>) -> Self {
        Self {
            accounts,
            parameters: HashMap::new(),
        }
    }

    /// Replace the signer accounts.
    pub fn with_accounts(mut self, accounts: Vec<Address>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Set one parameter of a module.
    pub fn with_parameter(
        mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.parameters
            .entry(module.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    /// Replace all parameters of a module.
    pub fn with_module_parameters(
        mut self,
        module: impl Into<String>,
        parameters: BTreeMap<String, Value>,
    ) -> Self {
        self.parameters.insert(module.into(), parameters);
        self
    }

    /// The signer accounts.
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// The parameters supplied for a module.
    pub fn parameters_for(&self, module: &str) -> BTreeMap<String, Value> {
        self.parameters.get(module).cloned().unwrap_or_default()
    }
}
