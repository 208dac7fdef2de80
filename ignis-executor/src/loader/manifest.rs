//! Serde model of the YAML module manifest.

use serde::Deserialize;
use std::collections::BTreeMap;

/// A manifest: a set of modules, one of which is deployed.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// The module to deploy. Defaults to the last one listed.
    #[serde(default)]
    pub root: Option<String>,
    /// Module declarations.
    pub modules: Vec<ModuleSpec>,
}

/// One module.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpec {
    /// Module name, unique in the manifest.
    pub name: String,
    /// Modules whose outputs this one reads as `${Module.output}`.
    #[serde(default)]
    pub uses: Vec<String>,
    /// Parameter defaults, read as `${params.name}`.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    /// Actions, declared in order.
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    /// Output name to `${...}` reference.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// One action. `as` names the handle later actions refer to; deployments
/// and bindings can also be referred to by contract name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Deploy a contract.
    Contract {
        /// Contract name.
        contract: String,
        /// Arguments: literals or references.
        #[serde(default)]
        args: Vec<serde_yaml::Value>,
        /// Handle name for later references.
        #[serde(default, rename = "as")]
        handle: Option<String>,
        /// Local name override.
        #[serde(default)]
        id: Option<String>,
        /// Sending account.
        #[serde(default)]
        from: Option<serde_yaml::Value>,
        /// Native amount sent along.
        #[serde(default)]
        value: Option<serde_yaml::Value>,
        /// References that must confirm first.
        #[serde(default)]
        after: Vec<String>,
    },
    /// Bind an existing address.
    ContractAt {
        /// Contract name.
        contract: String,
        /// Address literal or reference.
        address: serde_yaml::Value,
        /// Handle name for later references.
        #[serde(default, rename = "as")]
        handle: Option<String>,
        /// Local name override.
        #[serde(default)]
        id: Option<String>,
        /// References that must confirm first.
        #[serde(default)]
        after: Vec<String>,
    },
    /// Call a method.
    Call {
        /// Reference to the target contract.
        contract: String,
        /// Method name.
        method: String,
        /// Arguments: literals or references.
        #[serde(default)]
        args: Vec<serde_yaml::Value>,
        /// Handle name for later references.
        #[serde(default, rename = "as")]
        handle: Option<String>,
        /// Local name override.
        #[serde(default)]
        id: Option<String>,
        /// Sending account.
        #[serde(default)]
        from: Option<serde_yaml::Value>,
        /// Native amount sent along.
        #[serde(default)]
        value: Option<serde_yaml::Value>,
        /// References that must confirm first.
        #[serde(default)]
        after: Vec<String>,
    },
    /// Read an argument of an emitted event.
    ReadEventArgument {
        /// Reference to the deploy or call that emitted it.
        source: String,
        /// Event name.
        event: String,
        /// Argument name.
        argument: String,
        /// Reference to the emitting contract.
        #[serde(default)]
        emitter: Option<String>,
        /// Which matching event to read.
        #[serde(default)]
        index: usize,
        /// Handle name for later references.
        #[serde(default, rename = "as")]
        handle: Option<String>,
        /// Local name override.
        #[serde(default)]
        id: Option<String>,
    },
    /// Encode a call without sending it.
    EncodeFunctionCall {
        /// Reference to the target contract.
        contract: String,
        /// Method name.
        method: String,
        /// Arguments: literals or references.
        #[serde(default)]
        args: Vec<serde_yaml::Value>,
        /// Handle name for later references.
        #[serde(default, rename = "as")]
        handle: Option<String>,
        /// Local name override.
        #[serde(default)]
        id: Option<String>,
        /// References that must confirm first.
        #[serde(default)]
        after: Vec<String>,
    },
}

impl ActionSpec {
    /// The names the action's handle is registered under.
    pub fn handle_names(&self) -> Vec<&str> {
        let (handle, id, contract) = match self {
            Self::Contract {
                handle,
                id,
                contract,
                ..
            }
            | Self::ContractAt {
                handle,
                id,
                contract,
                ..
            } => (handle, id, Some(contract)),
            Self::Call { handle, id, .. }
            | Self::ReadEventArgument { handle, id, .. }
            | Self::EncodeFunctionCall { handle, id, .. } => (handle, id, None),
        };

        let mut names: Vec<&str> = [handle.as_deref(), id.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if id.is_none() {
            names.extend(contract.map(String::as_str));
        }
        names.dedup();
        names
    }
}

/// The name inside a `${...}` reference, if `raw` is one.
pub(crate) fn reference(raw: &str) -> Option<&str> {
    raw.trim()
        .strip_prefix("${")?
        .strip_suffix('}')
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
