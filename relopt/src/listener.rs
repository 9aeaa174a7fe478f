//! Observers of the optimization process.
//!
//! Listeners are for diagnostics only, they can't influence the optimizer.
use std::cell::RefCell;
use std::rc::Rc;

use crate::cost::Cost;
use crate::operator::DigestMode;
use crate::plan::PlanNode;

/// One successful rule firing.
#[derive(Clone, Debug)]
pub struct RuleProductionEvent {
    pub rule: String,
    /// Digest of matched expression.
    pub before: String,
    /// Digest of the expression which replaced it.
    pub after: String,
    pub before_cost: Cost,
    pub after_cost: Cost,
    /// Number of expressions the rule proposed.
    pub candidates: usize,
}

pub trait OptimizerListener {
    /// A rule matched `node` and was fired on it.
    fn rule_attempted(&mut self, _rule: &str, _node: &PlanNode) {}

    fn rule_production_succeeded(&mut self, _event: &RuleProductionEvent) {}

    /// `node` is no longer part of the plan.
    fn rel_discarded(&mut self, _node: &PlanNode) {}

    /// `node` is part of the final plan.
    fn rel_chosen(&mut self, _node: &PlanNode) {}
}

impl<L: OptimizerListener> OptimizerListener for Rc<RefCell<L>> {
    fn rule_attempted(&mut self, rule: &str, node: &PlanNode) {
        self.borrow_mut().rule_attempted(rule, node)
    }

    fn rule_production_succeeded(&mut self, event: &RuleProductionEvent) {
        self.borrow_mut().rule_production_succeeded(event)
    }

    fn rel_discarded(&mut self, node: &PlanNode) {
        self.borrow_mut().rel_discarded(node)
    }

    fn rel_chosen(&mut self, node: &PlanNode) {
        self.borrow_mut().rel_chosen(node)
    }
}

/// Keeps every event, expressions are recorded by full digest.
#[derive(Debug, Default)]
pub struct RecordingListener {
    attempts: Vec<(String, String)>,
    productions: Vec<RuleProductionEvent>,
    discarded: Vec<String>,
    chosen: Vec<String>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(rule, digest)` pairs.
    pub fn attempts(&self) -> &[(String, String)] {
        &self.attempts
    }

    pub fn productions(&self) -> &[RuleProductionEvent] {
        &self.productions
    }

    pub fn discarded(&self) -> &[String] {
        &self.discarded
    }

    pub fn chosen(&self) -> &[String] {
        &self.chosen
    }
}

impl OptimizerListener for RecordingListener {
    fn rule_attempted(&mut self, rule: &str, node: &PlanNode) {
        self.attempts
            .push((rule.to_string(), node.digest(DigestMode::Full).to_string()));
    }

    fn rule_production_succeeded(&mut self, event: &RuleProductionEvent) {
        self.productions.push(event.clone());
    }

    fn rel_discarded(&mut self, node: &PlanNode) {
        self.discarded.push(node.digest(DigestMode::Full).to_string());
    }

    fn rel_chosen(&mut self, node: &PlanNode) {
        self.chosen.push(node.digest(DigestMode::Full).to_string());
    }
}
