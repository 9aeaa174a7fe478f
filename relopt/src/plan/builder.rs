use std::sync::Arc;

use anyhow::anyhow;
use arrow_schema::SchemaRef;
use datafusion_common::{JoinType, ScalarValue};
use datafusion_expr::Expr;

use crate::error::OptResult;
use crate::operator::{
    Aggregate, AggregateCall, Filter, Join, Limit, ModifyOperation, Operator, Projection, SetOp,
    SetOpKind, Sort, TableModify, TableScan, Values,
};
use crate::plan::{Plan, PlanNode, PlanNodeRef};
use crate::properties::{Collation, Convention, TraitSet};

/// Builds a plan bottom up, every node in the same convention.
///
/// ```
/// use std::sync::Arc;
/// use arrow_schema::{DataType, Field, Schema};
/// use datafusion_expr::{col, lit};
/// use relopt::plan::LogicalPlanBuilder;
///
/// let schema = Arc::new(Schema::new(vec![Field::new("c1", DataType::Int32, false)]));
/// let plan = LogicalPlanBuilder::new()
///     .scan("t1", schema).unwrap()
///     .filter(col("c1").gt(lit(1))).unwrap()
///     .limit(10).unwrap()
///     .build().unwrap();
/// assert_eq!(3, plan.bfs_iterator().count());
/// ```
#[derive(Default)]
pub struct LogicalPlanBuilder {
    root: Option<PlanNodeRef>,
    traits: TraitSet,
}

impl LogicalPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_convention(mut self, convention: Convention) -> Self {
        self.traits = self.traits.replace(convention);
        self
    }

    fn push<I>(mut self, operator: Operator, inputs: I) -> OptResult<Self>
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        let node = PlanNode::new(operator, inputs, self.traits.clone())?;
        self.root = Some(Arc::new(node));
        Ok(self)
    }

    fn take_root(&mut self) -> OptResult<PlanNodeRef> {
        self.root
            .take()
            .ok_or_else(|| anyhow!("Plan builder has no input yet"))
    }

    fn unary(mut self, operator: Operator) -> OptResult<Self> {
        let input = self.take_root()?;
        self.push(operator, vec![input])
    }

    pub fn scan<S: Into<String>>(self, table_name: S, schema: SchemaRef) -> OptResult<Self> {
        self.table_scan(TableScan::new(table_name, schema))
    }

    pub fn table_scan(self, scan: TableScan) -> OptResult<Self> {
        self.push(Operator::TableScan(scan), vec![])
    }

    pub fn values(self, schema: SchemaRef, tuples: Vec<Vec<ScalarValue>>) -> OptResult<Self> {
        self.push(Operator::Values(Values::new(schema, tuples)), vec![])
    }

    pub fn filter(self, condition: Expr) -> OptResult<Self> {
        self.unary(Operator::Filter(Filter::new(condition)))
    }

    pub fn projection<I: IntoIterator<Item = Expr>>(self, exprs: I) -> OptResult<Self> {
        self.unary(Operator::Projection(Projection::new(exprs)))
    }

    pub fn limit(self, limit: usize) -> OptResult<Self> {
        self.unary(Operator::Limit(Limit::new(limit)))
    }

    pub fn sort(self, collation: Collation) -> OptResult<Self> {
        self.unary(Operator::Sort(Sort::new(collation)))
    }

    pub fn aggregate(self, group_keys: Vec<usize>, calls: Vec<AggregateCall>) -> OptResult<Self> {
        self.unary(Operator::Aggregate(Aggregate::new(group_keys, calls)))
    }

    pub fn table_modify<S: Into<String>>(
        self,
        table_name: S,
        operation: ModifyOperation,
    ) -> OptResult<Self> {
        self.unary(Operator::TableModify(TableModify::new(table_name, operation)))
    }

    /// Joins current plan as left input with `right`.
    pub fn join(
        mut self,
        join_type: JoinType,
        condition: Expr,
        right: PlanNodeRef,
    ) -> OptResult<Self> {
        let left = self.take_root()?;
        self.push(
            Operator::Join(Join::new(join_type, condition)),
            vec![left, right],
        )
    }

    pub fn set_op<I>(mut self, kind: SetOpKind, all: bool, others: I) -> OptResult<Self>
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        let first = self.take_root()?;
        let inputs = std::iter::once(first).chain(others).collect::<Vec<_>>();
        self.push(Operator::SetOp(SetOp::new(kind, all)), inputs)
    }

    /// Current root, useful for building multi child plan, e.g. join.
    pub fn root(&self) -> Option<PlanNodeRef> {
        self.root.clone()
    }

    pub fn build(mut self) -> OptResult<Plan> {
        Ok(Plan::new(self.take_root()?))
    }
}
