#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::bail;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use maplit::hashmap;
use relopt::error::OptResult;
use relopt::heuristic::{HepOptimizer, HepOptimizerBuilder, HepProgram};
use relopt::listener::RecordingListener;
use relopt::operator::OperatorKind;
use relopt::optimizer::Optimizer;
use relopt::plan::explain::explain_to_string;
use relopt::plan::{LogicalPlanBuilder, Plan};
use relopt::properties::Convention;
use relopt::rules::{Rule, RuleCall, RuleKind, RuleOperand};

pub const INTERMEDIATE: Convention = Convention::new("INTERMEDIATE");
pub const PHYSICAL: Convention = Convention::new("PHYSICAL");

pub fn catalog() -> HashMap<&'static str, SchemaRef> {
    hashmap! {
        "t1" => Arc::new(Schema::new(vec![
            Field::new("c1", DataType::Int32, false),
            Field::new("c2", DataType::Utf8, false),
        ])),
        "t2" => Arc::new(Schema::new(vec![
            Field::new("c3", DataType::Int64, false),
            Field::new("c4", DataType::Utf8, true),
        ])),
    }
}

pub fn schema(table: &str) -> SchemaRef {
    catalog()
        .remove(table)
        .unwrap_or_else(|| panic!("Unknown table {}", table))
}

/// Plan builder starting with a scan of `table`.
pub fn scan(table: &str) -> LogicalPlanBuilder {
    LogicalPlanBuilder::new()
        .scan(table, schema(table))
        .unwrap()
}

pub fn explain(plan: &Plan) -> String {
    explain_to_string(plan).unwrap()
}

pub fn new_optimizer(program: HepProgram, plan: Plan) -> HepOptimizer {
    HepOptimizerBuilder::new(program).build(plan).unwrap()
}

pub fn optimize(program: HepProgram, plan: Plan) -> Plan {
    new_optimizer(program, plan).find_best_plan().unwrap()
}

pub fn recording_listener() -> Rc<RefCell<RecordingListener>> {
    Rc::new(RefCell::new(RecordingListener::new()))
}

/// Operator names of attempted expressions, in attempt order.
pub fn attempted_operators(listener: &Rc<RefCell<RecordingListener>>) -> Vec<String> {
    listener
        .borrow()
        .attempts()
        .iter()
        .map(|(_, digest)| digest.split('.').next().unwrap_or_default().to_string())
        .collect()
}

/// Checks invariants that must hold between any two transformations.
pub fn assert_graph_consistent(optimizer: &HepOptimizer) {
    let graph = optimizer.graph();
    assert!(graph.check_acyclic(None).is_ok(), "{}", graph.dump());

    for id in graph.vertex_ids() {
        let current = graph.current(id).unwrap();
        let mut input_ids = HashSet::new();
        for input in current.inputs() {
            let input_id = input
                .vertex_id()
                .unwrap_or_else(|| panic!("Raw input in vertex {}\n{}", id.index(), graph.dump()));
            assert!(graph.contains(input_id), "{}", graph.dump());
            input_ids.insert(input_id);
        }
        let edges = graph.inputs(id).into_iter().collect::<HashSet<_>>();
        assert_eq!(input_ids, edges, "{}", graph.dump());
    }

    for (key, id) in graph.digest_entries() {
        assert!(graph.contains(*id), "Dangling digest entry {}", key);
        assert_eq!(Some(key), graph.key(*id), "{}", graph.dump());
    }
}

/// Asserts that every vertex is reachable from root.
pub fn assert_no_garbage(optimizer: &HepOptimizer) {
    let graph = optimizer.graph();
    let root = graph.root().unwrap();
    let reachable = graph.reachable_from(root);
    for id in graph.vertex_ids() {
        assert!(reachable.contains(&id), "{}", graph.dump());
    }
}

/// Fires on shared projections without producing anything.
#[derive(Debug)]
pub struct SharedProjectionRule {
    operand: RuleOperand,
}

impl SharedProjectionRule {
    pub fn new() -> Self {
        Self {
            operand: RuleOperand::new(OperatorKind::Projection),
        }
    }
}

impl Rule for SharedProjectionRule {
    fn description(&self) -> &str {
        "SharedProjectionRule"
    }

    fn operand(&self) -> &RuleOperand {
        &self.operand
    }

    fn kind(&self) -> RuleKind {
        RuleKind::CommonRelSubExpr
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        match call.parents() {
            Some(parents) if parents.len() >= 2 => Ok(()),
            other => bail!("Expected shared projection, got parents {:?}", other),
        }
    }
}

/// Matches everything, produces nothing.
#[derive(Debug)]
pub struct VisitRule {
    operand: RuleOperand,
}

impl VisitRule {
    pub fn new() -> Self {
        Self {
            operand: RuleOperand::any(),
        }
    }
}

impl Rule for VisitRule {
    fn description(&self) -> &str {
        "VisitRule"
    }

    fn operand(&self) -> &RuleOperand {
        &self.operand
    }

    fn on_match(&self, _call: &mut RuleCall) -> OptResult<()> {
        Ok(())
    }
}
