//! The graph-construction API handed to module definitions.

use super::{BuildState, ModuleDefinition, ModuleOutputs};
use crate::error::{IgnisError, Result};
use crate::future::{Argument, Future, FutureKind, FutureRef};
use crate::graph::{ActionNode, ActionOperation};
use crate::types::{ActionId, FutureId, ModuleId};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Options for actions that may send a transaction.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    id: Option<String>,
    from: Option<Argument>,
    value: Option<Argument>,
    after: Vec<FutureRef>,
}

impl ActionOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the local name the action id is derived from.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Send from this account instead of the default one.
    pub fn from(mut self, from: impl Into<Argument>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Native amount to send along.
    pub fn value(mut self, value: impl Into<Argument>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Run only after these futures' actions confirm.
    pub fn after(mut self, future: &FutureRef) -> Self {
        self.after.push(future.clone());
        self
    }
}

/// Options for reading an event argument.
#[derive(Debug, Clone, Default)]
pub struct ReadEventOptions {
    id: Option<String>,
    emitter: Option<FutureRef>,
    index: usize,
}

impl ReadEventOptions {
    /// Default options: first matching event, emitted by the source contract.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the local name the action id is derived from.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The contract that emitted the event.
    pub fn emitter(mut self, emitter: &FutureRef) -> Self {
        self.emitter = Some(emitter.clone());
        self
    }

    /// Which matching event to read.
    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// Declares actions for one module instance.
///
/// Every declaration creates exactly one action and returns a handle to the
/// future it produces. Local names must be unique within the module; they
/// default to the names the deployment tool conventionally uses and can be
/// overridden through the options' `id`.
pub struct ModuleBuilder<'a> {
    state: &'a mut BuildState,
    module: ModuleId,
    parameters: BTreeMap<String, Value>,
    locals: HashMap<String, FutureRef>,
    actions: Vec<ActionId>,
    forward: Vec<(String, FutureKind)>,
}

impl<'a> ModuleBuilder<'a> {
    pub(crate) fn new(
        state: &'a mut BuildState,
        module: ModuleId,
        parameters: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            state,
            module,
            parameters,
            locals: HashMap::new(),
            actions: Vec::new(),
            forward: Vec::new(),
        }
    }

    /// The identity of the module being built.
    pub fn module_id(&self) -> &ModuleId {
        &self.module
    }

    /// The `index`-th signer account.
    pub fn get_account(&mut self, index: usize) -> Result<FutureRef> {
        let address = self
            .state
            .context
            .accounts()
            .get(index)
            .copied()
            .ok_or_else(|| IgnisError::UnresolvedReference {
                reference: format!("accounts.{}", index),
                module: self.module.to_string(),
                cause: format!(
                    "only {} account(s) available",
                    self.state.context.accounts().len()
                ),
            })?;

        let future = Future::resolved(
            FutureId::new(&self.module, &format!("accounts.{}", index)),
            FutureKind::Address,
            Value::address(address),
        );
        Ok(self.define_constant(future))
    }

    /// A module parameter that must be supplied.
    pub fn get_parameter(&mut self, name: &str) -> Result<FutureRef> {
        let value = self
            .parameters
            .get(name)
            .cloned()
            .ok_or_else(|| IgnisError::UnresolvedReference {
                reference: format!("params.{}", name),
                module: self.module.to_string(),
                cause: "parameter not supplied and no default given".to_string(),
            })?;
        Ok(self.parameter_future(name, value))
    }

    /// A module parameter with a default.
    pub fn get_parameter_or(&mut self, name: &str, default: impl Into<Value>) -> FutureRef {
        let value = self
            .parameters
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.into());
        self.parameter_future(name, value)
    }

    fn parameter_future(&mut self, name: &str, value: Value) -> FutureRef {
        let future = Future::resolved(
            FutureId::new(&self.module, &format!("params.{}", name)),
            FutureKind::RawValue,
            value,
        );
        self.define_constant(future)
    }

    fn define_constant(&mut self, future: Future) -> FutureRef {
        let handle = FutureRef::from(&future);
        // Repeated lookups of the same account or parameter share one future.
        self.state.futures.insert(future);
        handle
    }

    /// Deploy a contract.
    pub fn contract(&mut self, name: &str, args: Vec<Argument>) -> Result<FutureRef> {
        self.contract_with(name, args, ActionOptions::new())
    }

    /// Deploy a contract with options.
    pub fn contract_with(
        &mut self,
        name: &str,
        args: Vec<Argument>,
        options: ActionOptions,
    ) -> Result<FutureRef> {
        let local = options.id.clone().unwrap_or_else(|| name.to_string());
        let operation = ActionOperation::Deploy {
            contract: name.to_string(),
            args,
            value: options.value,
            from: options.from,
        };
        self.declare(local, operation, &options.after, Some(name.to_string()))
    }

    /// Bind an existing address as an instance of a contract.
    pub fn contract_at(&mut self, name: &str, address: impl Into<Argument>) -> Result<FutureRef> {
        self.contract_at_with(name, address, ActionOptions::new())
    }

    /// Bind an existing address with options. Only `id` and `after` apply.
    pub fn contract_at_with(
        &mut self,
        name: &str,
        address: impl Into<Argument>,
        options: ActionOptions,
    ) -> Result<FutureRef> {
        self.reject_tx_options("contract_at", &options)?;
        let local = options.id.clone().unwrap_or_else(|| name.to_string());
        let operation = ActionOperation::BindExisting {
            contract: name.to_string(),
            address: address.into(),
        };
        self.declare(local, operation, &options.after, Some(name.to_string()))
    }

    /// Call a method on a contract.
    pub fn call(
        &mut self,
        contract: &FutureRef,
        method: &str,
        args: Vec<Argument>,
    ) -> Result<FutureRef> {
        self.call_with(contract, method, args, ActionOptions::new())
    }

    /// Call a method on a contract with options.
    pub fn call_with(
        &mut self,
        contract: &FutureRef,
        method: &str,
        args: Vec<Argument>,
        options: ActionOptions,
    ) -> Result<FutureRef> {
        let contract_name = self.contract_name_of(contract);
        let local = options
            .id
            .clone()
            .unwrap_or_else(|| format!("{}.{}", contract_name, method));
        let operation = ActionOperation::Call {
            contract: contract.id().clone(),
            method: method.to_string(),
            args,
            value: options.value,
            from: options.from,
        };
        self.declare(local, operation, &options.after, Some(contract_name))
    }

    /// Read an argument of an event emitted by a deploy or call.
    pub fn read_event_argument(
        &mut self,
        source: &FutureRef,
        event: &str,
        argument: &str,
    ) -> Result<FutureRef> {
        self.read_event_argument_with(source, event, argument, ReadEventOptions::new())
    }

    /// Read an event argument with options.
    pub fn read_event_argument_with(
        &mut self,
        source: &FutureRef,
        event: &str,
        argument: &str,
        options: ReadEventOptions,
    ) -> Result<FutureRef> {
        let emitter_name = match &options.emitter {
            Some(emitter) => self.contract_name_of(emitter),
            None => self.contract_name_of(source),
        };
        let local = options.id.clone().unwrap_or_else(|| {
            format!("{}.{}.{}.{}", emitter_name, event, argument, options.index)
        });
        let operation = ActionOperation::ReadEventArgument {
            source: source.id().clone(),
            emitter: options.emitter.as_ref().map(|e| e.id().clone()),
            event: event.to_string(),
            argument: argument.to_string(),
            index: options.index,
        };
        self.declare(local, operation, &[], None)
    }

    /// Encode a method call without sending it.
    pub fn encode_function_call(
        &mut self,
        contract: &FutureRef,
        method: &str,
        args: Vec<Argument>,
    ) -> Result<FutureRef> {
        self.encode_function_call_with(contract, method, args, ActionOptions::new())
    }

    /// Encode a method call with options. Only `id` and `after` apply.
    pub fn encode_function_call_with(
        &mut self,
        contract: &FutureRef,
        method: &str,
        args: Vec<Argument>,
        options: ActionOptions,
    ) -> Result<FutureRef> {
        self.reject_tx_options("encode_function_call", &options)?;
        let contract_name = self.contract_name_of(contract);
        let local = options
            .id
            .clone()
            .unwrap_or_else(|| format!("{}.encodeFunctionCall({})", contract_name, method));
        let operation = ActionOperation::EncodeCall {
            contract: contract.id().clone(),
            method: method.to_string(),
            args,
        };
        self.declare(local, operation, &options.after, None)
    }

    /// Use another module, sharing its instance with every other user that
    /// binds the same parameters.
    pub fn use_module(&mut self, definition: &ModuleDefinition) -> Result<ModuleOutputs> {
        self.use_module_with(definition, BTreeMap::new())
    }

    /// Use another module with parameter overrides. Overrides take precedence
    /// over the context's parameters for that module and become part of the
    /// instance identity.
    pub fn use_module_with(
        &mut self,
        definition: &ModuleDefinition,
        parameters: BTreeMap<String, Value>,
    ) -> Result<ModuleOutputs> {
        super::build_module(&mut *self.state, definition, parameters)
    }

    /// Refer to an action declared later in this module.
    ///
    /// The reference must be declared before the module returns, with the
    /// given kind.
    pub fn reference(&mut self, local_name: &str, kind: FutureKind) -> FutureRef {
        if let Some(existing) = self.locals.get(local_name) {
            return existing.clone();
        }
        self.forward.push((local_name.to_string(), kind));
        FutureRef::new(FutureId::new(&self.module, local_name), kind)
    }

    fn reject_tx_options(&self, operation: &str, options: &ActionOptions) -> Result<()> {
        if options.from.is_some() || options.value.is_some() {
            return Err(IgnisError::ModuleDefinition {
                module: self.module.to_string(),
                cause: format!("{} sends no transaction; 'from' and 'value' do not apply", operation),
            });
        }
        Ok(())
    }

    fn contract_name_of(&self, handle: &FutureRef) -> String {
        self.state
            .futures
            .get(handle.id())
            .and_then(Future::contract)
            .map(str::to_string)
            .unwrap_or_else(|| {
                handle
                    .id()
                    .as_str()
                    .rsplit_once('#')
                    .map_or(handle.id().as_str(), |(_, local)| local)
                    .to_string()
            })
    }

    fn declare(
        &mut self,
        local: String,
        operation: ActionOperation,
        after: &[FutureRef],
        contract: Option<String>,
    ) -> Result<FutureRef> {
        if local.is_empty() || local.contains('#') {
            return Err(IgnisError::ModuleDefinition {
                module: self.module.to_string(),
                cause: format!("invalid local name '{}'", local),
            });
        }
        if self.locals.contains_key(&local) {
            return Err(IgnisError::DuplicateId {
                id: local,
                module: self.module.to_string(),
                hint: "pass an explicit id to disambiguate".to_string(),
            });
        }

        let id = ActionId::new(&self.module, &local);
        let kind = operation.kind().output_kind();
        let node = ActionNode::new(id.clone(), self.module.clone(), operation)
            .with_after(after.iter().map(|f| f.id().clone()).collect());

        let mut future = Future::define(node.produces.clone(), kind, id.clone());
        if let Some(contract) = contract {
            future = future.with_contract(contract);
        }
        let handle = FutureRef::from(&future);

        if !self.state.futures.insert(future) {
            return Err(IgnisError::DuplicateId {
                id: id.to_string(),
                module: self.module.to_string(),
                hint: "a future with this id already exists".to_string(),
            });
        }
        self.state.nodes.push(node);
        self.actions.push(id);
        self.locals.insert(local, handle.clone());
        Ok(handle)
    }

    /// Check forward references and hand back the declared actions.
    pub(crate) fn finish(self) -> Result<Vec<ActionId>> {
        for (name, kind) in &self.forward {
            match self.locals.get(name) {
                None => {
                    return Err(IgnisError::UnresolvedReference {
                        reference: name.clone(),
                        module: self.module.to_string(),
                        cause: "referenced but never declared in this module".to_string(),
                    });
                }
                Some(declared) if declared.kind() != *kind => {
                    return Err(IgnisError::UnresolvedReference {
                        reference: name.clone(),
                        module: self.module.to_string(),
                        cause: format!(
                            "referenced as a {} but declared as a {}",
                            kind,
                            declared.kind()
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(self.actions)
    }
}
