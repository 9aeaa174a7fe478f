use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::prelude::StableGraph;
use petgraph::visit::{Bfs, Dfs};
use petgraph::{Directed, Direction};
use prettytable::{format, Table};

use crate::error::{OptResult, OptimizerError};
use crate::operator::{DigestMode, VertexId};
use crate::plan::{DigestKey, PlanNode, PlanNodeRef};

type HepGraph = StableGraph<HepVertex, (), Directed, u32>;

/// A slot in the plan graph.
///
/// `current` is the expression this vertex stands for, its inputs are placeholders of other
/// vertices. `placeholder` is what parents hold in their inputs.
#[derive(Debug)]
pub struct HepVertex {
    current: PlanNodeRef,
    placeholder: PlanNodeRef,
    /// Key `current` is registered under.
    key: DigestKey,
}

/// A plan as a single root dag, edges pointing from parents to inputs.
///
/// Besides vertices, the graph maps digests of expressions to vertices holding them, which is
/// how the optimizer finds existing vertices for new expressions.
#[derive(Default)]
pub struct PlanGraph {
    graph: HepGraph,
    root: Option<VertexId>,
    digest_to_vertex: HashMap<DigestKey, VertexId>,
}

impl PlanGraph {
    /// Allocates a vertex for `node`, the caller registers its key.
    pub(super) fn add_vertex(&mut self, node: PlanNodeRef, key: DigestKey) -> VertexId {
        let id = self.graph.add_node(HepVertex {
            current: node.clone(),
            placeholder: node.clone(),
            key,
        });
        self.graph[id].placeholder = Arc::new(PlanNode::vertex(
            id,
            node.traits().clone(),
            node.row_type().clone(),
        ));
        id
    }

    /// Replaces expression of vertex `id`, returning the old one and its key.
    pub(super) fn set_current(
        &mut self,
        id: VertexId,
        node: PlanNodeRef,
        key: DigestKey,
    ) -> Option<(PlanNodeRef, DigestKey)> {
        self.graph.node_weight_mut(id).map(|vertex| {
            (
                std::mem::replace(&mut vertex.current, node),
                std::mem::replace(&mut vertex.key, key),
            )
        })
    }

    pub(super) fn remove_vertex(&mut self, id: VertexId) -> Option<PlanNodeRef> {
        self.graph.remove_node(id).map(|vertex| vertex.current)
    }

    pub(super) fn add_edge(&mut self, parent: VertexId, input: VertexId) {
        self.graph.update_edge(parent, input, ());
    }

    pub(super) fn remove_edge(&mut self, parent: VertexId, input: VertexId) {
        if let Some(edge) = self.graph.find_edge(parent, input) {
            self.graph.remove_edge(edge);
        }
    }

    pub(super) fn set_root(&mut self, root: VertexId) {
        self.root = Some(root);
    }

    pub(super) fn register(&mut self, key: DigestKey, id: VertexId) {
        self.digest_to_vertex.insert(key, id);
    }

    /// Removes `key` only if it still maps to `id`.
    pub(super) fn unregister(&mut self, key: &DigestKey, id: VertexId) {
        if self.digest_to_vertex.get(key) == Some(&id) {
            self.digest_to_vertex.remove(key);
        }
    }

    pub(super) fn lookup(&self, key: &DigestKey) -> Option<VertexId> {
        self.digest_to_vertex.get(key).copied()
    }

    /// Drops digest entries pointing at `removed` vertices.
    pub(super) fn purge(&mut self, removed: &HashSet<VertexId>) {
        self.digest_to_vertex.retain(|_, id| !removed.contains(id));
    }

    pub fn root(&self) -> Option<VertexId> {
        self.root
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.graph.contains_node(id)
    }

    pub fn current(&self, id: VertexId) -> Option<&PlanNodeRef> {
        self.graph.node_weight(id).map(|vertex| &vertex.current)
    }

    pub fn placeholder(&self, id: VertexId) -> Option<&PlanNodeRef> {
        self.graph.node_weight(id).map(|vertex| &vertex.placeholder)
    }

    pub fn key(&self, id: VertexId) -> Option<&DigestKey> {
        self.graph.node_weight(id).map(|vertex| &vertex.key)
    }

    pub fn parents(&self, id: VertexId) -> Vec<VertexId> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn inputs(&self, id: VertexId) -> Vec<VertexId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: VertexId, direction: Direction) -> Vec<VertexId> {
        if !self.contains(id) {
            return vec![];
        }
        let mut ids = self
            .graph
            .neighbors_directed(id, direction)
            .collect::<Vec<VertexId>>();
        ids.sort();
        ids
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.graph.node_indices().collect()
    }

    pub fn digest_entries(&self) -> impl Iterator<Item = (&DigestKey, &VertexId)> {
        self.digest_to_vertex.iter()
    }

    /// Vertices reachable from `start` following edges, `start` included.
    pub fn reachable_from(&self, start: VertexId) -> HashSet<VertexId> {
        let mut reachable = HashSet::new();
        if !self.contains(start) {
            return reachable;
        }
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(id) = bfs.next(&self.graph) {
            reachable.insert(id);
        }
        reachable
    }

    /// Vertices reachable from `start`, in depth first pre order.
    pub fn depth_first_from(&self, start: VertexId) -> Vec<VertexId> {
        let mut ids = Vec::with_capacity(self.graph.node_count());
        if !self.contains(start) {
            return ids;
        }
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(id) = dfs.next(&self.graph) {
            ids.push(id);
        }
        ids
    }

    /// All vertices, parents before inputs.
    pub fn topological_order(&self) -> OptResult<Vec<VertexId>> {
        toposort(&self.graph, None).map_err(|cycle| {
            OptimizerError::structural(
                None,
                format!("Cycle detected at vertex {}", cycle.node_id().index()),
                self.dump(),
            )
            .into()
        })
    }

    pub fn check_acyclic(&self, rule: Option<&str>) -> OptResult<()> {
        if is_cyclic_directed(&self.graph) {
            return Err(
                OptimizerError::structural(rule, "Plan graph contains a cycle", self.dump())
                    .into(),
            );
        }
        Ok(())
    }

    /// Renders all vertices as a table, the root marked with `*`.
    pub fn dump(&self) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["Vertex", "Expression", "Parents"]);

        let mut ids = self.vertex_ids();
        ids.sort();
        for id in ids {
            let vertex = &self.graph[id];
            let name = if self.root == Some(id) {
                format!("*{}", id.index())
            } else {
                id.index().to_string()
            };
            let parents = self
                .parents(id)
                .iter()
                .map(|p| p.index().to_string())
                .collect::<Vec<String>>()
                .join(", ");
            table.add_row(row![name, vertex.current.digest(DigestMode::Full), parents]);
        }
        table.to_string()
    }
}
