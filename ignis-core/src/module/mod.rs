//! Module graph builder.
//!
//! A module definition is a callback that receives a [`ModuleBuilder`] and
//! declares actions on it. Building a root module walks the callbacks of
//! every module it uses and produces one [`DeploymentGraph`].
//!
//! Used modules are deduplicated by identity: the module name plus a hash
//! of its effective parameters. Two `use_module` calls that resolve to the
//! same identity share a single set of actions, however many consumers
//! there are.

mod builder;
mod context;
mod definition;
mod outputs;
mod registry;

pub use builder::{ActionOptions, ModuleBuilder, ReadEventOptions};
pub use context::BuildContext;
pub use definition::{BuildFn, ModuleDefinition};
pub use outputs::ModuleOutputs;
pub use registry::{BuiltModule, ModuleRegistry};

use crate::error::Result;
use crate::future::FutureTable;
use crate::graph::{ActionNode, DeploymentGraph};
use crate::types::{ActionId, ModuleId};
use crate::value::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Number of digest bytes kept in a module's parameter hash.
const PARAMETER_HASH_BYTES: usize = 8;

/// Mutable state shared by all module builders of one graph.
pub(crate) struct BuildState {
    context: BuildContext,
    nodes: Vec<ActionNode>,
    futures: FutureTable,
    registry: ModuleRegistry,
}

/// Build the deployment graph rooted at `definition`.
#[tracing::instrument(skip_all, fields(module = %definition.name()))]
pub fn build(definition: &ModuleDefinition, context: &BuildContext) -> Result<DeploymentGraph> {
    let mut state = BuildState {
        context: context.clone(),
        nodes: Vec::new(),
        futures: FutureTable::new(),
        registry: ModuleRegistry::new(),
    };

    let outputs = build_module(&mut state, definition, BTreeMap::new())?;

    let root = outputs
        .module()
        .cloned()
        .unwrap_or_else(|| ModuleId::new(definition.name(), None));
    let modules = state.registry.modules().map(|m| m.id.clone()).collect();
    let outputs = outputs
        .iter()
        .map(|(name, future)| (name.to_string(), future.id().clone()))
        .collect();

    let graph = DeploymentGraph::new(root, modules, state.nodes, state.futures, outputs)?;
    tracing::debug!(
        actions = graph.len(),
        modules = graph.modules().len(),
        "Deployment graph built"
    );
    Ok(graph)
}

pub(crate) fn build_module(
    state: &mut BuildState,
    definition: &ModuleDefinition,
    overrides: BTreeMap<String, Value>,
) -> Result<ModuleOutputs> {
    state.registry.check_definition(definition)?;

    let mut parameters = state.context.parameters_for(definition.name());
    parameters.extend(overrides);
    let id = ModuleId::new(definition.name(), parameter_hash(&parameters)?);

    if let Some(built) = state.registry.get(&id) {
        tracing::trace!(module = %id, "Reusing built module");
        return Ok(built.outputs.clone());
    }

    state.registry.enter(definition.name())?;
    let result = invoke(state, definition, id.clone(), parameters);
    state.registry.leave();
    let (mut outputs, actions) = result?;

    outputs.set_module(id.clone());
    state.registry.insert(BuiltModule {
        id,
        outputs: outputs.clone(),
        actions,
    });
    Ok(outputs)
}

fn invoke(
    state: &mut BuildState,
    definition: &ModuleDefinition,
    id: ModuleId,
    parameters: BTreeMap<String, Value>,
) -> Result<(ModuleOutputs, Vec<ActionId>)> {
    let mut builder = ModuleBuilder::new(state, id, parameters);
    let outputs = definition.invoke(&mut builder)?;
    let actions = builder.finish()?;
    Ok((outputs, actions))
}

/// Short, stable hash of a module's effective parameters.
///
/// `None` when there are no parameters, so unparameterized modules keep
/// plain `Module#local` action ids.
pub fn parameter_hash(parameters: &BTreeMap<String, Value>) -> Result<Option<String>> {
    if parameters.is_empty() {
        return Ok(None);
    }
    let canonical = serde_json::to_vec(parameters)?;
    let digest = Sha256::digest(&canonical);
    Ok(Some(hex::encode(&digest[..PARAMETER_HASH_BYTES])))
}
