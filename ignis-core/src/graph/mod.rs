//! The deployment graph: action nodes connected by future edges.
//!
//! A graph is assembled once from a module definition and never mutated
//! afterwards. Assembly derives each node's dependencies from the futures it
//! reads, checks future kinds, and rejects cycles, so a graph that exists is
//! always executable in some order.

mod action;

pub use action::{ActionKind, ActionNode, ActionOperation, ActionStatus};

use crate::error::{IgnisError, Result};
use crate::future::{Argument, Future, FutureKind, FutureTable};
use crate::types::{ActionId, FutureId, ModuleId};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};

/// An immutable, validated DAG of actions.
#[derive(Debug, Clone)]
pub struct DeploymentGraph {
    root: ModuleId,
    modules: Vec<ModuleId>,
    nodes: Vec<ActionNode>,
    index: HashMap<ActionId, usize>,
    dependents: HashMap<ActionId, Vec<ActionId>>,
    futures: FutureTable,
    outputs: Vec<(String, FutureId)>,
}

impl DeploymentGraph {
    /// Assemble and validate a graph.
    ///
    /// `nodes` must be in declaration order; that order breaks ties in
    /// [`DeploymentGraph::topological_order`].
    pub fn new(
        root: ModuleId,
        modules: Vec<ModuleId>,
        mut nodes: Vec<ActionNode>,
        futures: FutureTable,
        outputs: Vec<(String, FutureId)>,
    ) -> Result<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(IgnisError::DuplicateId {
                    id: node.id.to_string(),
                    module: node.module.to_string(),
                    hint: "each action needs a unique id within its module".to_string(),
                });
            }
        }

        for node in &mut nodes {
            let mut depends_on = BTreeSet::new();
            for input in node.inputs() {
                let future = futures.get(input).ok_or_else(|| IgnisError::UnresolvedReference {
                    reference: input.to_string(),
                    module: node.module.to_string(),
                    cause: format!("no future with this id is defined (used by {})", node.id),
                })?;
                if let Some(producer) = future.producer() {
                    depends_on.insert(producer.clone());
                }
            }
            node.depends_on = depends_on;
        }

        for (name, id) in &outputs {
            if !futures.contains(id) {
                return Err(IgnisError::ModuleDefinition {
                    module: root.to_string(),
                    cause: format!("output '{}' refers to unknown future '{}'", name, id),
                });
            }
        }

        let mut dependents: HashMap<ActionId, Vec<ActionId>> = HashMap::new();
        for node in &nodes {
            for dep in &node.depends_on {
                dependents.entry(dep.clone()).or_default().push(node.id.clone());
            }
        }

        let graph = Self {
            root,
            modules,
            nodes,
            index,
            dependents,
            futures,
            outputs,
        };
        graph.check_future_kinds()?;
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_future_kinds(&self) -> Result<()> {
        let is_contract = |k: FutureKind| k == FutureKind::ContractHandle;
        let is_account = |k: FutureKind| k == FutureKind::Address;

        for node in &self.nodes {
            match &node.operation {
                ActionOperation::Deploy { from, .. } => {
                    if let Some(id) = from.as_ref().and_then(Argument::as_future) {
                        self.expect_kind(node, id, is_account, "address")?;
                    }
                }
                ActionOperation::Call { contract, from, .. } => {
                    self.expect_kind(node, contract, is_contract, "contract handle")?;
                    if let Some(id) = from.as_ref().and_then(Argument::as_future) {
                        self.expect_kind(node, id, is_account, "address")?;
                    }
                }
                ActionOperation::EncodeCall { contract, .. } => {
                    self.expect_kind(node, contract, is_contract, "contract handle")?;
                }
                ActionOperation::ReadEventArgument {
                    source, emitter, ..
                } => {
                    let produced_by_tx = self
                        .future(source)
                        .and_then(Future::producer)
                        .and_then(|p| self.node(p))
                        .is_some_and(|p| p.kind().submits_transaction());
                    if !produced_by_tx {
                        return Err(self.kind_error(node, source, "deploy or call"));
                    }
                    if let Some(emitter) = emitter {
                        self.expect_kind(node, emitter, is_contract, "contract handle")?;
                    }
                }
                ActionOperation::BindExisting { address, .. } => {
                    if let Some(id) = address.as_future() {
                        self.expect_kind(node, id, |k: FutureKind| k.is_address_like(), "address")?;
                    }
                }
            }
        }
        Ok(())
    }

    fn expect_kind(
        &self,
        node: &ActionNode,
        id: &FutureId,
        accepts: impl Fn(FutureKind) -> bool,
        expected: &str,
    ) -> Result<()> {
        match self.future(id) {
            Some(f) if accepts(f.kind()) => Ok(()),
            _ => Err(self.kind_error(node, id, expected)),
        }
    }

    fn kind_error(&self, node: &ActionNode, id: &FutureId, expected: &str) -> IgnisError {
        let actual = match self.future(id) {
            Some(f) => match f.producer().and_then(|p| self.node(p)) {
                Some(producer) => format!("{} from a {} action", f.kind(), producer.kind()),
                None => f.kind().to_string(),
            },
            None => "undefined future".to_string(),
        };
        IgnisError::InvalidFutureKind {
            action_id: node.id.clone(),
            future_id: id.clone(),
            expected: expected.to_string(),
            actual,
        }
    }

    /// Depth-first search for a dependency cycle, reporting its path.
    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            // `path` is the current chain; `stack` holds the unvisited
            // dependencies of each entry in `path`.
            let mut path: Vec<usize> = vec![start];
            let mut stack: Vec<VecDeque<usize>> = vec![self.dependency_indices(start)];
            marks[start] = Mark::InProgress;

            while let Some(pending) = stack.last_mut() {
                match pending.pop_front() {
                    Some(next) => match marks[next] {
                        Mark::Unvisited => {
                            marks[next] = Mark::InProgress;
                            path.push(next);
                            stack.push(self.dependency_indices(next));
                        }
                        Mark::InProgress => {
                            let from = path.iter().position(|&i| i == next).unwrap_or(0);
                            // Path runs consumer -> dependency; report it in
                            // execution order instead.
                            let mut cycle: Vec<ActionId> = path[from..]
                                .iter()
                                .rev()
                                .map(|&i| self.nodes[i].id.clone())
                                .collect();
                            cycle.push(self.nodes[path[path.len() - 1]].id.clone());
                            return Err(IgnisError::CyclicGraph { cycle });
                        }
                        Mark::Done => {}
                    },
                    None => {
                        stack.pop();
                        if let Some(done) = path.pop() {
                            marks[done] = Mark::Done;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn dependency_indices(&self, i: usize) -> VecDeque<usize> {
        self.nodes[i]
            .depends_on
            .iter()
            .filter_map(|id| self.index.get(id).copied())
            .collect()
    }

    /// The root module.
    pub fn root(&self) -> &ModuleId {
        &self.root
    }

    /// Every module instance in the graph, dependencies before consumers.
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    /// Look up an action.
    pub fn node(&self, id: &ActionId) -> Option<&ActionNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Whether the graph contains an action.
    pub fn contains(&self, id: &ActionId) -> bool {
        self.index.contains_key(id)
    }

    /// All actions in declaration order.
    pub fn nodes(&self) -> &[ActionNode] {
        &self.nodes
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no actions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a future definition.
    pub fn future(&self, id: &FutureId) -> Option<&Future> {
        self.futures.get(id)
    }

    /// The future definitions, with pre-resolved values filled in.
    pub fn futures(&self) -> &FutureTable {
        &self.futures
    }

    /// The root module's named outputs.
    pub fn outputs(&self) -> &[(String, FutureId)] {
        &self.outputs
    }

    /// Actions that directly depend on `id`.
    pub fn dependents(&self, id: &ActionId) -> &[ActionId] {
        self.dependents.get(id).map_or(&[], Vec::as_slice)
    }

    /// Every action reachable downstream of `id`, excluding `id` itself.
    pub fn transitive_dependents(&self, id: &ActionId) -> BTreeSet<ActionId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&ActionId> = self.dependents(id).iter().collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                queue.extend(self.dependents(next).iter());
            }
        }
        seen
    }

    /// Number of actions of a given kind.
    pub fn count_kind(&self, kind: ActionKind) -> usize {
        self.nodes.iter().filter(|n| n.kind() == kind).count()
    }

    /// Actions in a dependency-respecting order.
    ///
    /// Kahn's algorithm with declaration order as the tie-breaker, so the
    /// result is the same on every call.
    pub fn topological_order(&self) -> Vec<ActionId> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.depends_on.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, d)| *d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(i)) = ready.pop() {
            let id = &self.nodes[i].id;
            order.push(id.clone());
            for dependent in self.dependents(id) {
                if let Some(&j) = self.index.get(dependent) {
                    in_degree[j] -= 1;
                    if in_degree[j] == 0 {
                        ready.push(Reverse(j));
                    }
                }
            }
        }
        order
    }
}
