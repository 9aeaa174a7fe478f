use std::collections::HashMap;

use crate::optimizer::Optimizer;
use crate::plan::PlanNodeRef;
use crate::rules::Rule;

/// Runtime context of one rule firing.
pub struct RuleCall<'a> {
    optimizer: &'a dyn Optimizer,
    rule: &'a dyn Rule,
    /// Matched expressions, in operand pre-order.
    rels: Vec<PlanNodeRef>,
    /// All inputs of expressions matched by unordered operands, keyed by binding ordinal.
    node_inputs: HashMap<usize, Vec<PlanNodeRef>>,
    parents: Option<Vec<PlanNodeRef>>,
    results: Vec<PlanNodeRef>,
}

impl<'a> RuleCall<'a> {
    pub fn new(
        optimizer: &'a dyn Optimizer,
        rule: &'a dyn Rule,
        rels: Vec<PlanNodeRef>,
        node_inputs: HashMap<usize, Vec<PlanNodeRef>>,
        parents: Option<Vec<PlanNodeRef>>,
    ) -> Self {
        Self {
            optimizer,
            rule,
            rels,
            node_inputs,
            parents,
            results: vec![],
        }
    }

    pub fn optimizer(&self) -> &'a dyn Optimizer {
        self.optimizer
    }

    pub fn rule(&self) -> &'a dyn Rule {
        self.rule
    }

    /// Matched expression at `ordinal`, `0` being the root of the match.
    pub fn rel(&self, ordinal: usize) -> &PlanNodeRef {
        &self.rels[ordinal]
    }

    pub fn rels(&self) -> &[PlanNodeRef] {
        &self.rels
    }

    /// Every input of the expression at `ordinal`, if it was matched by an unordered operand.
    pub fn child_rels(&self, ordinal: usize) -> Option<&[PlanNodeRef]> {
        self.node_inputs.get(&ordinal).map(Vec::as_slice)
    }

    /// Parents of the matched root, only provided to common sub expression rules.
    pub fn parents(&self) -> Option<&[PlanNodeRef]> {
        self.parents.as_deref()
    }

    /// Registers an expression equivalent to `rel(0)`.
    pub fn transform_to<N: Into<PlanNodeRef>>(&mut self, node: N) {
        self.results.push(node.into());
    }

    pub fn results(&self) -> &[PlanNodeRef] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PlanNodeRef> {
        self.results
    }
}
