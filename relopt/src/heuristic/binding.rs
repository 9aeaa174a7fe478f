use std::collections::HashMap;

use crate::error::{OptResult, OptimizerError};
use crate::heuristic::PlanGraph;
use crate::operator::DigestMode;
use crate::plan::PlanNodeRef;
use crate::rules::{ChildPolicy, RuleOperand};

/// Matches a rule operand tree against expressions of a [`PlanGraph`].
///
/// Matched expressions are collected in pre order, failed partial matches leave nothing behind.
pub(super) struct Binding<'a> {
    graph: &'a PlanGraph,
    rels: Vec<PlanNodeRef>,
    node_inputs: HashMap<usize, Vec<PlanNodeRef>>,
}

impl<'a> Binding<'a> {
    pub(super) fn new(graph: &'a PlanGraph) -> Self {
        Self {
            graph,
            rels: vec![],
            node_inputs: HashMap::new(),
        }
    }

    pub(super) fn into_parts(self) -> (Vec<PlanNodeRef>, HashMap<usize, Vec<PlanNodeRef>>) {
        (self.rels, self.node_inputs)
    }

    pub(super) fn match_operands(
        &mut self,
        operand: &RuleOperand,
        node: &PlanNodeRef,
    ) -> OptResult<bool> {
        let mark = self.rels.len();
        let matched = self.try_match(operand, node)?;
        if !matched {
            self.rollback(mark);
        }
        Ok(matched)
    }

    fn try_match(&mut self, operand: &RuleOperand, node: &PlanNodeRef) -> OptResult<bool> {
        if !operand.matches(node) {
            return Ok(false);
        }

        // Inputs which are not placeholders belong to an expression the graph doesn't know.
        if node.inputs().iter().any(|input| input.vertex_id().is_none()) {
            return Ok(false);
        }

        let ordinal = self.rels.len();
        self.rels.push(node.clone());

        match operand.policy() {
            ChildPolicy::Any => Ok(true),
            ChildPolicy::Unordered => {
                let inputs = self.resolve_inputs(node)?;
                for child in operand.children() {
                    let mut matched = false;
                    for input in &inputs {
                        if self.match_operands(child, input)? {
                            matched = true;
                            break;
                        }
                    }
                    if !matched {
                        return Ok(false);
                    }
                }
                self.node_inputs.insert(ordinal, inputs);
                Ok(true)
            }
            ChildPolicy::Exact => {
                if node.inputs().len() != operand.children().len() {
                    return Ok(false);
                }
                let inputs = self.resolve_inputs(node)?;
                for (child, input) in operand.children().iter().zip(inputs.iter()) {
                    if !self.match_operands(child, input)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Current expressions of `node`'s inputs.
    fn resolve_inputs(&self, node: &PlanNodeRef) -> OptResult<Vec<PlanNodeRef>> {
        node.inputs()
            .iter()
            .map(|input| -> OptResult<PlanNodeRef> {
                input
                    .vertex_id()
                    .and_then(|id| self.graph.current(id))
                    .cloned()
                    .ok_or_else(|| {
                        OptimizerError::structural(
                            None,
                            format!(
                                "Input {} of {} refers to a removed vertex",
                                input.digest(DigestMode::Full),
                                node.digest(DigestMode::Full)
                            ),
                            self.graph.dump(),
                        )
                        .into()
                    })
            })
            .collect()
    }

    fn rollback(&mut self, len: usize) {
        self.rels.truncate(len);
        self.node_inputs.retain(|ordinal, _| *ordinal < len);
    }
}
