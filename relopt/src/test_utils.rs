use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};

use crate::heuristic::{HepOptimizerBuilder, HepProgramBuilder};
use crate::operator::{Operator, TableScan};
use crate::optimizer::Optimizer;
use crate::plan::{Plan, PlanNode};
use crate::properties::TraitSet;
use crate::rules::RuleRef;

pub fn t1_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("c1", DataType::Int32, false),
        Field::new("c2", DataType::Utf8, false),
    ]))
}

pub fn t2_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("c3", DataType::Int64, false),
        Field::new("c4", DataType::Utf8, true),
    ]))
}

/// Scan of `table_name` over [`t1_schema`], in no convention.
pub fn scan_node(table_name: &str) -> PlanNode {
    PlanNode::new(
        Operator::TableScan(TableScan::new(table_name, t1_schema())),
        vec![],
        TraitSet::default(),
    )
    .unwrap()
}

/// Applies `rules` as one collection until fixed point.
pub fn optimize_with_rules(plan: Plan, rules: Vec<RuleRef>) -> Plan {
    let program = HepProgramBuilder::new()
        .add_rule_collection(rules)
        .build()
        .unwrap();

    HepOptimizerBuilder::new(program)
        .build(plan)
        .unwrap()
        .find_best_plan()
        .unwrap()
}
