use derive_more::Display;
use petgraph::algo::all_simple_paths;
use petgraph::graphmap::DiGraphMap;

use crate::properties::{RelTrait, TraitDef};

/// Calling convention, e.g. the implementation strategy of an expression.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display)]
#[display(fmt = "{}", _0)]
pub struct Convention(&'static str);

impl Convention {
    /// Convention of expressions that have no implementation yet.
    pub const NONE: Convention = Convention("NONE");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl Default for Convention {
    fn default() -> Self {
        Convention::NONE
    }
}

impl RelTrait for Convention {
    fn def(&self) -> TraitDef {
        TraitDef::Convention
    }

    fn satisfies(&self, required: &Self) -> bool {
        self == required
    }
}

/// Directed graph of conventions, with an arc for each guaranteed converter.
#[derive(Debug, Default)]
pub struct ConversionGraph {
    graph: DiGraphMap<Convention, ()>,
}

impl ConversionGraph {
    pub fn add_arc(&mut self, from: Convention, to: Convention) {
        self.graph.add_edge(from, to, ());
    }

    /// All simple paths from `from` to `to`, shortest first.
    ///
    /// Each path includes both ends. Paths of equal length keep discovery order.
    pub fn paths(&self, from: Convention, to: Convention) -> Vec<Vec<Convention>> {
        if from == to {
            return vec![vec![from]];
        }
        if !self.graph.contains_node(from) || !self.graph.contains_node(to) {
            return vec![];
        }

        let mut paths: Vec<Vec<Convention>> =
            all_simple_paths::<Vec<Convention>, _>(&self.graph, from, to, 0, None).collect();
        paths.sort_by_key(|p| p.len());
        paths
    }
}
