use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::mem::swap;
use std::sync::{Arc, OnceLock};

use arrow_schema::{DataType, SchemaRef};
use itertools::Itertools;
use smallvec::SmallVec;

use crate::error::OptResult;
use crate::operator::{
    AbstractConverter, DigestMode, Operator, OperatorKind, OperatorTrait, Vertex, VertexId,
};
use crate::properties::{Convention, TraitSet};

mod builder;
pub use builder::*;
pub mod explain;

pub type PlanNodeRef = Arc<PlanNode>;

/// One node in a plan.
///
/// This is used in both input and output of an optimizer, and for the expressions rules
/// produce. A node is immutable once built, "replacing" an input means building a copy with
/// [`PlanNode::copy_with_inputs`].
#[derive(Debug)]
pub struct PlanNode {
    operator: Operator,
    inputs: SmallVec<[PlanNodeRef; 2]>,
    traits: TraitSet,
    row_type: SchemaRef,
    /// Lazily computed digest, one slot per [`DigestMode`].
    digests: [OnceLock<String>; 2],
}

/// Digests are caches, equality ignores them.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.traits == other.traits
            && self.inputs == other.inputs
    }
}

impl PlanNode {
    /// Creates a node, deriving its row type from `inputs`.
    pub fn new<I>(operator: Operator, inputs: I, traits: TraitSet) -> OptResult<Self>
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        let inputs: SmallVec<[PlanNodeRef; 2]> = inputs.into_iter().collect();
        let input_types = inputs
            .iter()
            .map(|input| input.row_type.clone())
            .collect::<Vec<SchemaRef>>();
        let row_type = operator.derive_row_type(&input_types)?;
        Ok(Self::with_row_type(operator, inputs, traits, row_type))
    }

    pub fn with_row_type<I>(
        operator: Operator,
        inputs: I,
        traits: TraitSet,
        row_type: SchemaRef,
    ) -> Self
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        Self {
            operator,
            inputs: inputs.into_iter().collect(),
            traits,
            row_type,
            digests: Default::default(),
        }
    }

    /// Placeholder for vertex `id` of a heuristic optimizer graph.
    pub fn vertex(id: VertexId, traits: TraitSet, row_type: SchemaRef) -> Self {
        Self::with_row_type(Operator::Vertex(Vertex::new(id)), vec![], traits, row_type)
    }

    /// Requests `traits` for `input`, to be expanded into concrete converters later.
    pub fn abstract_converter(input: PlanNodeRef, traits: TraitSet) -> Self {
        let row_type = input.row_type.clone();
        Self::with_row_type(
            Operator::AbstractConverter(AbstractConverter::default()),
            vec![input],
            traits,
            row_type,
        )
    }

    pub fn copy_with_inputs<I>(&self, inputs: I) -> Self
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        Self::with_row_type(
            self.operator.clone(),
            inputs,
            self.traits.clone(),
            self.row_type.clone(),
        )
    }

    pub fn copy_with_traits(&self, traits: TraitSet) -> Self {
        Self::with_row_type(
            self.operator.clone(),
            self.inputs.iter().cloned(),
            traits,
            self.row_type.clone(),
        )
    }

    /// Copy with another operator of the same row type.
    pub fn copy_with_operator(&self, operator: Operator) -> Self {
        Self::with_row_type(
            operator,
            self.inputs.iter().cloned(),
            self.traits.clone(),
            self.row_type.clone(),
        )
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn kind(&self) -> OperatorKind {
        self.operator.kind()
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn traits(&self) -> &TraitSet {
        &self.traits
    }

    pub fn convention(&self) -> Convention {
        self.traits.convention()
    }

    pub fn row_type(&self) -> &SchemaRef {
        &self.row_type
    }

    pub fn is_converter(&self) -> bool {
        self.operator.is_converter()
    }

    /// Id of the vertex if this node is a graph placeholder.
    pub fn vertex_id(&self) -> Option<VertexId> {
        self.operator.as_vertex().map(|v| v.id())
    }

    /// Structural fingerprint of this node and, recursively, its inputs.
    ///
    /// Placeholders render as `#<vertex id>`, so once a node lives in a graph its digest only
    /// covers the node itself.
    pub fn digest(&self, mode: DigestMode) -> &str {
        self.digests[mode.index()].get_or_init(|| self.compute_digest(mode))
    }

    fn compute_digest(&self, mode: DigestMode) -> String {
        if let Some(id) = self.vertex_id() {
            return format!("#{}", id.index());
        }

        let inputs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(idx, input)| format!("input#{}={}", idx, input.digest(mode)));
        let terms = self
            .operator
            .terms(mode)
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, value));
        format!(
            "{}.{}({})",
            self.operator.as_ref(),
            self.traits,
            inputs.chain(terms).join(", ")
        )
    }
}

impl Display for PlanNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.operator.as_ref(), self.traits)?;
        let terms = self.operator.terms(DigestMode::Full);
        if !terms.is_empty() {
            write!(
                f,
                "({})",
                terms
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .join(", ")
            )?;
        }
        Ok(())
    }
}

/// Deduplication key of a node: its digest plus the field types of its row type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DigestKey {
    digest: String,
    field_types: Vec<DataType>,
}

impl DigestKey {
    pub fn new(node: &PlanNode, mode: DigestMode) -> Self {
        Self {
            digest: node.digest(mode).to_string(),
            field_types: node
                .row_type
                .fields()
                .iter()
                .map(|f| f.data_type().clone())
                .collect(),
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl Display for DigestKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest)
    }
}

/// A query plan.
///
/// A query plan is a single root dag(directed acyclic graph). It can be used in many places, for
/// example, logical plan after validating an ast, a physical plan after completing optimizer.
#[derive(PartialEq, Debug, Clone)]
pub struct Plan {
    root: PlanNodeRef,
}

/// Breath first iterator of a single root dag plan, visiting shared nodes once.
struct BFSPlanNodeIter {
    visited: HashSet<*const PlanNode>,
    cur_level: Vec<PlanNodeRef>,
    next_level: Vec<PlanNodeRef>,
}

impl Iterator for BFSPlanNodeIter {
    type Item = PlanNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_level.is_empty() {
            swap(&mut self.cur_level, &mut self.next_level);
            self.cur_level.reverse();
        }

        if let Some(p) = self.cur_level.pop() {
            for input in &p.inputs {
                if self.visited.insert(Arc::as_ptr(input)) {
                    self.next_level.push(input.clone());
                }
            }

            Some(p)
        } else {
            None
        }
    }
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    pub fn bfs_iterator(&self) -> impl Iterator<Item = PlanNodeRef> {
        let mut visited = HashSet::new();
        visited.insert(Arc::as_ptr(&self.root));

        BFSPlanNodeIter {
            cur_level: vec![self.root.clone()],
            next_level: vec![],
            visited,
        }
    }
}

#[cfg(test)]
mod tests {
    use datafusion_expr::{col, lit};

    use super::*;
    use crate::operator::{Filter, Limit, Projection};
    use crate::test_utils::{scan_node, t1_schema};

    #[test]
    fn test_digest_is_deterministic() {
        let scan = Arc::new(scan_node("t1"));
        let filter = PlanNode::new(
            Operator::Filter(Filter::new(col("c1").gt(lit(1)))),
            vec![scan],
            TraitSet::default(),
        )
        .unwrap();

        for mode in [DigestMode::Full, DigestMode::Normalized] {
            let first = filter.digest(mode).to_string();
            assert_eq!(first, filter.digest(mode));
            assert_eq!(first, filter.copy_with_inputs(filter.inputs().to_vec()).digest(mode));
        }
        assert_eq!(
            "Limit.NONE(input#0=TableScan.NONE(table=t1), limit=3)",
            PlanNode::new(
                Operator::Limit(Limit::new(3)),
                vec![Arc::new(scan_node("t1"))],
                TraitSet::default()
            )
            .unwrap()
            .digest(DigestMode::Full)
        );
    }

    #[test]
    fn test_digest_key_ignores_projection_names() {
        let scan = Arc::new(scan_node("t1"));
        let project = |name: &str| {
            PlanNode::new(
                Operator::Projection(Projection::with_names(
                    vec![col("c1")],
                    vec![name.to_string()],
                )),
                vec![scan.clone()],
                TraitSet::default(),
            )
            .unwrap()
        };
        let (p1, p2) = (project("x"), project("y"));

        assert_eq!(
            DigestKey::new(&p1, DigestMode::Normalized),
            DigestKey::new(&p2, DigestMode::Normalized)
        );
        assert_ne!(
            DigestKey::new(&p1, DigestMode::Full),
            DigestKey::new(&p2, DigestMode::Full)
        );
    }

    #[test]
    fn test_vertex_placeholder() {
        let node = PlanNode::vertex(VertexId::new(4), TraitSet::default(), t1_schema());
        assert_eq!(Some(VertexId::new(4)), node.vertex_id());
        assert_eq!("#4", node.digest(DigestMode::Normalized));
        assert_eq!(None, scan_node("t1").vertex_id());
    }

    #[test]
    fn test_bfs_visits_shared_node_once() {
        let scan = Arc::new(scan_node("t1"));
        let limit = Arc::new(
            PlanNode::new(
                Operator::Limit(Limit::new(1)),
                vec![scan.clone()],
                TraitSet::default(),
            )
            .unwrap(),
        );
        let root = Arc::new(
            PlanNode::new(
                Operator::Join(crate::operator::Join::new(
                    datafusion_common::JoinType::Inner,
                    lit(true),
                )),
                vec![limit, scan],
                TraitSet::default(),
            )
            .unwrap(),
        );

        let kinds = Plan::new(root)
            .bfs_iterator()
            .map(|n| n.kind())
            .collect::<Vec<_>>();
        assert_eq!(
            vec![OperatorKind::Join, OperatorKind::Limit, OperatorKind::TableScan],
            kinds
        );
    }
}
