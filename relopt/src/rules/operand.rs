use crate::operator::OperatorKind;
use crate::plan::PlanNode;
use crate::properties::Convention;

pub type NodePredicate = fn(&PlanNode) -> bool;

/// How an operand matches inputs of the expression it matched.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ChildPolicy {
    /// Inputs are not examined.
    Any,
    /// Each child operand must match at least one input, in any order.
    Unordered,
    /// Child operands match inputs positionally, counts must agree.
    Exact,
}

/// A node of a rule's pattern tree.
///
/// If we want to match `Join(Filter, Scan)`, the operand tree should be defined like:
/// ```
/// use relopt::operator::OperatorKind;
/// use relopt::rules::RuleOperand;
///
/// RuleOperand::new(OperatorKind::Join).inputs(vec![
///     RuleOperand::new(OperatorKind::Filter),
///     RuleOperand::new(OperatorKind::TableScan),
/// ]);
/// ```
#[derive(Clone, Debug)]
pub struct RuleOperand {
    /// `None` matches every operator.
    kind: Option<OperatorKind>,
    convention: Option<Convention>,
    predicate: Option<NodePredicate>,
    policy: ChildPolicy,
    children: Vec<RuleOperand>,
}

impl RuleOperand {
    pub fn new(kind: OperatorKind) -> Self {
        Self {
            kind: Some(kind),
            convention: None,
            predicate: None,
            policy: ChildPolicy::Any,
            children: vec![],
        }
    }

    pub fn any() -> Self {
        Self {
            kind: None,
            convention: None,
            predicate: None,
            policy: ChildPolicy::Any,
            children: vec![],
        }
    }

    pub fn with_convention(mut self, convention: Convention) -> Self {
        self.convention = Some(convention);
        self
    }

    pub fn with_predicate(mut self, predicate: NodePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Matches inputs positionally.
    pub fn inputs(mut self, children: Vec<RuleOperand>) -> Self {
        self.policy = ChildPolicy::Exact;
        self.children = children;
        self
    }

    /// Matches expressions without inputs.
    pub fn no_inputs(self) -> Self {
        self.inputs(vec![])
    }

    pub fn unordered_inputs(mut self, children: Vec<RuleOperand>) -> Self {
        self.policy = ChildPolicy::Unordered;
        self.children = children;
        self
    }

    pub fn kind(&self) -> Option<OperatorKind> {
        self.kind
    }

    pub fn convention(&self) -> Option<Convention> {
        self.convention
    }

    pub fn policy(&self) -> ChildPolicy {
        self.policy
    }

    pub fn children(&self) -> &[RuleOperand] {
        &self.children
    }

    /// Tests `node` itself against this operand, inputs excluded.
    pub fn matches(&self, node: &PlanNode) -> bool {
        self.kind.map_or(true, |kind| node.kind() == kind)
            && self
                .convention
                .map_or(true, |convention| node.convention() == convention)
            && self.predicate.map_or(true, |predicate| predicate(node))
    }

    /// Number of operands in this tree.
    pub fn operand_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(RuleOperand::operand_count)
            .sum::<usize>()
    }

    /// Checks the shape of this tree, returning a message for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        match self.policy {
            ChildPolicy::Any if !self.children.is_empty() => {
                return Err("operand ignoring its inputs has child operands".to_string())
            }
            ChildPolicy::Unordered if self.children.is_empty() => {
                return Err("unordered operand without child operands".to_string())
            }
            _ => {}
        }
        self.children.iter().try_for_each(RuleOperand::validate)
    }
}
