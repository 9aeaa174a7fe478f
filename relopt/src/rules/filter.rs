use crate::error::OptResult;
use crate::operator::{Filter, OperatorKind};
use crate::plan::PlanNode;
use crate::rules::{Rule, RuleCall, RuleOperand};

fn is_trivial_filter(node: &PlanNode) -> bool {
    node.operator()
        .as_filter()
        .map_or(false, Filter::is_always_true)
}

lazy_static! {
    static ref REMOVE_TRIVIAL_FILTER_OPERAND: RuleOperand =
        RuleOperand::new(OperatorKind::Filter).with_predicate(is_trivial_filter);
}

/// Removes filters whose condition is literal `true`.
#[derive(Clone, Debug, Default)]
pub struct RemoveTrivialFilterRule {}

impl RemoveTrivialFilterRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for RemoveTrivialFilterRule {
    fn description(&self) -> &str {
        "RemoveTrivialFilterRule"
    }

    fn operand(&self) -> &RuleOperand {
        &REMOVE_TRIVIAL_FILTER_OPERAND
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        if let Some(input) = call.rel(0).inputs().first().cloned() {
            call.transform_to(input);
        }
        Ok(())
    }
}
