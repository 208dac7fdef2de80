//! ModuleLoader - turns a YAML manifest into module definitions.

use super::manifest::{ActionSpec, Manifest, ModuleSpec, reference};
use ignis_core::error::{IgnisError, Result};
use ignis_core::future::{Argument, FutureRef};
use ignis_core::module::{ActionOptions, ModuleBuilder, ModuleDefinition, ModuleOutputs, ReadEventOptions};
use ignis_core::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Loads declarative module manifests.
///
/// ```ignore
/// let manifest = ModuleLoader::load_file("deploy/proxy.yaml")?;
/// let report = executor.deploy(manifest.root(), BuildContext::default()).await?;
/// ```
pub struct ModuleLoader;

impl ModuleLoader {
    /// Load a manifest from a YAML string.
    pub fn load_str(yaml: &str) -> Result<LoadedManifest> {
        Self::load_named(yaml, "<inline>")
    }

    /// Load a manifest from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<LoadedManifest> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| IgnisError::Io {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        Self::load_named(&yaml, &path.display().to_string())
    }

    fn load_named(yaml: &str, source_name: &str) -> Result<LoadedManifest> {
        let manifest: Manifest = serde_yaml::from_str(yaml).map_err(|e| IgnisError::YamlParse {
            source_name: source_name.to_string(),
            cause: e.to_string(),
        })?;
        let loaded = LoadedManifest::from_manifest(manifest, source_name)?;
        tracing::debug!(
            source = source_name,
            modules = loaded.definitions.len(),
            root = %loaded.root,
            "Loaded module manifest"
        );
        Ok(loaded)
    }
}

/// Module definitions produced from one manifest.
#[derive(Debug)]
pub struct LoadedManifest {
    definitions: BTreeMap<String, ModuleDefinition>,
    root: String,
}

impl LoadedManifest {
    /// The definition of a module by name.
    pub fn module(&self, name: &str) -> Option<&ModuleDefinition> {
        self.definitions.get(name)
    }

    /// The module to deploy.
    pub fn root(&self) -> &ModuleDefinition {
        &self.definitions[&self.root]
    }

    /// All module names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    fn from_manifest(manifest: Manifest, source_name: &str) -> Result<Self> {
        let root = match (&manifest.root, manifest.modules.last()) {
            (Some(root), _) => root.clone(),
            (None, Some(last)) => last.name.clone(),
            (None, None) => {
                return Err(IgnisError::YamlParse {
                    source_name: source_name.to_string(),
                    cause: "manifest declares no modules".to_string(),
                });
            }
        };

        let mut specs: HashMap<String, Arc<ModuleSpec>> = HashMap::new();
        for spec in manifest.modules {
            if specs.contains_key(&spec.name) {
                return Err(IgnisError::DuplicateId {
                    id: spec.name.clone(),
                    module: source_name.to_string(),
                    hint: "module names must be unique within a manifest".to_string(),
                });
            }
            specs.insert(spec.name.clone(), Arc::new(spec));
        }

        if !specs.contains_key(&root) {
            return Err(IgnisError::UnresolvedReference {
                reference: root,
                module: source_name.to_string(),
                cause: "root module is not declared".to_string(),
            });
        }

        let mut definitions = BTreeMap::new();
        let mut names: Vec<&String> = specs.keys().collect();
        names.sort();
        for name in names {
            define(name, &specs, &mut definitions, &mut Vec::new())?;
        }

        Ok(Self { definitions, root })
    }
}

/// Create the definition of `name` after the modules it uses, so every
/// user shares one definition per module.
fn define(
    name: &str,
    specs: &HashMap<String, Arc<ModuleSpec>>,
    definitions: &mut BTreeMap<String, ModuleDefinition>,
    stack: &mut Vec<String>,
) -> Result<ModuleDefinition> {
    if let Some(definition) = definitions.get(name) {
        return Ok(definition.clone());
    }
    if stack.iter().any(|s| s == name) {
        let mut path = stack.clone();
        path.push(name.to_string());
        return Err(IgnisError::ModuleCycle {
            module: name.to_string(),
            path: path.join(" -> "),
        });
    }

    let spec = specs
        .get(name)
        .cloned()
        .ok_or_else(|| IgnisError::UnresolvedReference {
            reference: name.to_string(),
            module: stack.last().cloned().unwrap_or_default(),
            cause: "module is not declared in the manifest".to_string(),
        })?;

    stack.push(name.to_string());
    let mut used = Vec::with_capacity(spec.uses.len());
    for dependency in &spec.uses {
        used.push(define(dependency, specs, definitions, stack)?);
    }
    stack.pop();

    let captured = Arc::clone(&spec);
    let definition = ModuleDefinition::new(spec.name.clone(), move |m| {
        declare(m, &captured, &used)
    });
    definitions.insert(name.to_string(), definition.clone());
    Ok(definition)
}

fn declare(
    m: &mut ModuleBuilder<'_>,
    spec: &ModuleSpec,
    used: &[ModuleDefinition],
) -> Result<ModuleOutputs> {
    let mut scope = Scope {
        module: &spec.name,
        defaults: &spec.parameters,
        locals: HashMap::new(),
        imports: HashMap::new(),
    };
    for definition in used {
        let outputs = m.use_module(definition)?;
        scope.imports.insert(definition.name().to_string(), outputs);
    }

    for action in &spec.actions {
        let future = scope.declare_action(m, action)?;
        for name in action.handle_names() {
            scope.locals.insert(name.to_string(), future.clone());
        }
    }

    let mut outputs = ModuleOutputs::new();
    for (name, raw) in &spec.outputs {
        outputs.insert(name.clone(), scope.future(m, raw)?);
    }
    Ok(outputs)
}

/// Names visible while declaring one module.
struct Scope<'s> {
    module: &'s str,
    defaults: &'s BTreeMap<String, serde_yaml::Value>,
    locals: HashMap<String, FutureRef>,
    imports: HashMap<String, ModuleOutputs>,
}

impl Scope<'_> {
    fn declare_action(&self, m: &mut ModuleBuilder<'_>, action: &ActionSpec) -> Result<FutureRef> {
        match action {
            ActionSpec::Contract {
                contract,
                args,
                id,
                from,
                value,
                after,
                ..
            } => {
                let args = self.arguments(m, args)?;
                let options = self.options(m, id, from.as_ref(), value.as_ref(), after)?;
                m.contract_with(contract, args, options)
            }
            ActionSpec::ContractAt {
                contract,
                address,
                id,
                after,
                ..
            } => {
                let address = self.argument(m, address)?;
                let options = self.options(m, id, None, None, after)?;
                m.contract_at_with(contract, address, options)
            }
            ActionSpec::Call {
                contract,
                method,
                args,
                id,
                from,
                value,
                after,
                ..
            } => {
                let target = self.future(m, contract)?;
                let args = self.arguments(m, args)?;
                let options = self.options(m, id, from.as_ref(), value.as_ref(), after)?;
                m.call_with(&target, method, args, options)
            }
            ActionSpec::ReadEventArgument {
                source,
                event,
                argument,
                emitter,
                index,
                id,
                ..
            } => {
                let source = self.future(m, source)?;
                let mut options = ReadEventOptions::new().index(*index);
                if let Some(emitter) = emitter {
                    options = options.emitter(&self.future(m, emitter)?);
                }
                if let Some(id) = id {
                    options = options.id(id.clone());
                }
                m.read_event_argument_with(&source, event, argument, options)
            }
            ActionSpec::EncodeFunctionCall {
                contract,
                method,
                args,
                id,
                after,
                ..
            } => {
                let target = self.future(m, contract)?;
                let args = self.arguments(m, args)?;
                let options = self.options(m, id, None, None, after)?;
                m.encode_function_call_with(&target, method, args, options)
            }
        }
    }

    fn options(
        &self,
        m: &mut ModuleBuilder<'_>,
        id: &Option<String>,
        from: Option<&serde_yaml::Value>,
        value: Option<&serde_yaml::Value>,
        after: &[String],
    ) -> Result<ActionOptions> {
        let mut options = ActionOptions::new();
        if let Some(id) = id {
            options = options.id(id.clone());
        }
        if let Some(from) = from {
            options = options.from(self.argument(m, from)?);
        }
        if let Some(value) = value {
            options = options.value(self.argument(m, value)?);
        }
        for raw in after {
            options = options.after(&self.future(m, raw)?);
        }
        Ok(options)
    }

    fn arguments(&self, m: &mut ModuleBuilder<'_>, raw: &[serde_yaml::Value]) -> Result<Vec<Argument>> {
        raw.iter().map(|v| self.argument(m, v)).collect()
    }

    /// A reference string becomes a future input, a sequence a list, and
    /// anything else a literal.
    fn argument(&self, m: &mut ModuleBuilder<'_>, raw: &serde_yaml::Value) -> Result<Argument> {
        match raw {
            serde_yaml::Value::String(s) => match reference(s) {
                Some(name) => self.resolve(m, name).map(Argument::from),
                None => Ok(Argument::Literal(Value::string(s.clone()))),
            },
            serde_yaml::Value::Sequence(items) => {
                Ok(Argument::List(self.arguments(m, items)?))
            }
            other => literal(other).map(Argument::Literal),
        }
    }

    /// A value that must be a `${...}` reference.
    fn future(&self, m: &mut ModuleBuilder<'_>, raw: &str) -> Result<FutureRef> {
        let name = reference(raw).ok_or_else(|| IgnisError::UnresolvedReference {
            reference: raw.to_string(),
            module: self.module.to_string(),
            cause: "expected a ${...} reference".to_string(),
        })?;
        self.resolve(m, name)
    }

    fn resolve(&self, m: &mut ModuleBuilder<'_>, name: &str) -> Result<FutureRef> {
        if let Some(local) = self.locals.get(name) {
            return Ok(local.clone());
        }
        if let Some(index) = name.strip_prefix("accounts.") {
            let index = index.parse().map_err(|_| self.unresolved(name, "account index must be a number"))?;
            return m.get_account(index);
        }
        if let Some(param) = name.strip_prefix("params.") {
            return match self.defaults.get(param) {
                Some(default) => Ok(m.get_parameter_or(param, literal(default)?)),
                None => m.get_parameter(param),
            };
        }
        if let Some((module, output)) = name.split_once('.') {
            if let Some(outputs) = self.imports.get(module) {
                return outputs.require(output);
            }
        }
        Err(self.unresolved(name, "no earlier action, used module output, account or parameter has this name"))
    }

    fn unresolved(&self, name: &str, cause: &str) -> IgnisError {
        IgnisError::UnresolvedReference {
            reference: name.to_string(),
            module: self.module.to_string(),
            cause: cause.to_string(),
        }
    }
}

fn literal(raw: &serde_yaml::Value) -> Result<Value> {
    serde_json::to_value(raw)
        .map(Value::from)
        .map_err(|e| IgnisError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_core::graph::ActionKind;
    use ignis_core::module::{BuildContext, build};
    use ignis_core::types::{ActionId, Address, ModuleId};

    const PROXY_MANIFEST: &str = r#"
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

  - name: BoxModule
    uses: [ProxyModule]
    actions:
      - op: contract_at
        contract: Box
        address: "${ProxyModule.proxy}"
    outputs:
      box: "${Box}"
"#;

    fn accounts() -> BuildContext {
        BuildContext::new(vec![Address::new([1; 20]), Address::new([2; 20])])
    }

    #[test]
    fn manifest_builds_the_proxy_pattern() {
        let manifest = ModuleLoader::load_str(PROXY_MANIFEST).unwrap();
        assert_eq!(manifest.root().name(), "BoxModule");
        assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["BoxModule", "ProxyModule"]);

        let graph = build(manifest.root(), &accounts()).unwrap();
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.count_kind(ActionKind::Deploy), 2);
        assert_eq!(graph.count_kind(ActionKind::ReadEventArgument), 1);

        let proxy_module = ModuleId::new("ProxyModule", None);
        let proxy = ActionId::new(&proxy_module, "TransparentUpgradeableProxy");
        let admin_read = ActionId::new(
            &proxy_module,
            "TransparentUpgradeableProxy.AdminChanged.newAdmin.0",
        );
        assert!(graph.contains(&admin_read));
        assert!(graph.dependents(&proxy).contains(&admin_read));
    }

    #[test]
    fn used_modules_share_one_definition() {
        let manifest = ModuleLoader::load_str(PROXY_MANIFEST).unwrap();
        let direct = manifest.module("ProxyModule").unwrap();
        let graph = build(direct, &accounts()).unwrap();
        assert_eq!(graph.len(), 4);

        // Building the root pulls in the same ProxyModule instance once.
        let root = build(manifest.root(), &accounts()).unwrap();
        assert_eq!(root.count_kind(ActionKind::Deploy), 2);
    }

    #[test]
    fn parameter_defaults_apply() {
        let yaml = r#"
modules:
  - name: Token
    parameters:
      supply: 1000
    actions:
      - op: contract
        contract: Token
        args: ["${params.supply}", [1, "${accounts.1}"]]
"#;
        let manifest = ModuleLoader::load_str(yaml).unwrap();
        assert!(build(manifest.root(), &accounts()).is_ok());

        let missing = r#"
modules:
  - name: Token
    actions:
      - op: contract
        contract: Token
        args: ["${params.supply}"]
"#;
        let manifest = ModuleLoader::load_str(missing).unwrap();
        let err = build(manifest.root(), &accounts()).unwrap_err();
        assert_eq!(err.code(), "E103");
    }

    #[test]
    fn unknown_references_are_rejected() {
        let yaml = r#"
modules:
  - name: M
    actions:
      - op: contract_at
        contract: Box
        address: "${Nowhere.proxy}"
"#;
        let manifest = ModuleLoader::load_str(yaml).unwrap();
        assert!(matches!(
            build(manifest.root(), &accounts()),
            Err(IgnisError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn module_use_cycles_are_rejected() {
        let yaml = r#"
modules:
  - name: A
    uses: [B]
  - name: B
    uses: [A]
"#;
        let err = ModuleLoader::load_str(yaml).unwrap_err();
        assert!(matches!(err, IgnisError::ModuleCycle { .. }), "{}", err);
    }

    #[test]
    fn malformed_manifests_are_parse_errors() {
        let err = ModuleLoader::load_str("modules: [ { name: M, bogus: 1 } ]").unwrap_err();
        assert_eq!(err.code(), "E801");

        let err = ModuleLoader::load_str("modules: []").unwrap_err();
        assert_eq!(err.code(), "E801");

        let err = ModuleLoader::load_str("root: Missing\nmodules: [ { name: M } ]").unwrap_err();
        assert!(matches!(err, IgnisError::UnresolvedReference { .. }));
    }

    #[test]
    fn manifests_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.yaml");
        std::fs::write(&path, PROXY_MANIFEST).unwrap();

        let manifest = ModuleLoader::load_file(&path).unwrap();
        assert!(manifest.module("ProxyModule").is_some());

        let err = ModuleLoader::load_file(dir.path().join("missing.yaml")).unwrap_err();
        assert_eq!(err.code(), "E901");
    }
}
