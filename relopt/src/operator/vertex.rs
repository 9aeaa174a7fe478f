use anyhow::bail;
use arrow_schema::SchemaRef;
use petgraph::stable_graph::NodeIndex;

use crate::error::OptResult;
use crate::operator::{DigestMode, OperatorTrait, Term};

/// Stable index of a vertex in the heuristic optimizer's graph.
pub type VertexId = NodeIndex<u32>;

/// Reference to a graph vertex, standing in for whatever expression the vertex currently holds.
///
/// Only the heuristic optimizer creates it. Its row type and traits are the ones of the vertex's
/// expression at creation time.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Vertex {
    id: VertexId,
}

impl Vertex {
    pub fn new(id: VertexId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }
}

impl OperatorTrait for Vertex {
    fn derive_row_type(&self, _inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        bail!("Row type of vertex #{} is fixed at creation", self.id.index())
    }

    fn estimate_row_count(&self, _input_rows: &[f64]) -> f64 {
        1.0
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![("id", self.id.index().to_string())]
    }
}
