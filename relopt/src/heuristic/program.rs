use std::fmt::{Debug, Formatter};

use strum_macros::{Display, EnumIter};

use crate::error::{OptResult, OptimizerError};
use crate::rules::{Rule, RuleRef};

/// Order in which vertices are visited when applying rules.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Display, EnumIter)]
pub enum MatchOrder {
    /// Depth first from root, resuming from the produced vertex after a match.
    #[default]
    Arbitrary,
    /// Like [`MatchOrder::Arbitrary`], but keeps descending from each produced vertex before
    /// moving on.
    DepthFirst,
    /// Parents before inputs, restarting after every match.
    TopDown,
    /// Inputs before parents, restarting after every match.
    BottomUp,
}

pub type RuleClassPredicate = fn(&dyn Rule) -> bool;

#[derive(Clone)]
pub enum HepInstruction {
    RuleInstance(RuleRef),
    /// Registered rule with this description, skipped if there is none.
    RuleByDescription(String),
    /// Registered rules accepted by the predicate.
    RuleClass(RuleClassPredicate),
    RuleCollection(Vec<RuleRef>),
    /// Registered converter rules with this guaranteed flag.
    ConverterRules { guaranteed: bool },
    CommonRelSubExprRules,
    MatchOrder(MatchOrder),
    MatchLimit(usize),
    /// Runs repeatedly until an execution makes no transformation.
    Subprogram(HepProgram),
    BeginGroup,
    EndGroup,
}

impl Debug for HepInstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HepInstruction::RuleInstance(rule) => write!(f, "RuleInstance({})", rule.description()),
            HepInstruction::RuleByDescription(d) => write!(f, "RuleByDescription({})", d),
            HepInstruction::RuleClass(_) => write!(f, "RuleClass"),
            HepInstruction::RuleCollection(rules) => f
                .debug_list()
                .entries(rules.iter().map(|r| r.description()))
                .finish(),
            HepInstruction::ConverterRules { guaranteed } => {
                write!(f, "ConverterRules(guaranteed={})", guaranteed)
            }
            HepInstruction::CommonRelSubExprRules => write!(f, "CommonRelSubExprRules"),
            HepInstruction::MatchOrder(order) => write!(f, "MatchOrder({})", order),
            HepInstruction::MatchLimit(limit) => write!(f, "MatchLimit({})", limit),
            HepInstruction::Subprogram(program) => write!(f, "Subprogram({:?})", program),
            HepInstruction::BeginGroup => write!(f, "BeginGroup"),
            HepInstruction::EndGroup => write!(f, "EndGroup"),
        }
    }
}

/// Instructions executed by a [`HepOptimizer`](crate::heuristic::HepOptimizer).
///
/// Execution state (match order, match limit, open group) is per program run, each run starts
/// with [`MatchOrder::Arbitrary`], no match limit and no group.
#[derive(Clone, Debug, Default)]
pub struct HepProgram {
    instructions: Vec<HepInstruction>,
}

impl HepProgram {
    pub fn builder() -> HepProgramBuilder {
        HepProgramBuilder::new()
    }

    pub fn instructions(&self) -> &[HepInstruction] {
        &self.instructions
    }

    /// Rules given by instance, subprograms included.
    pub fn rules(&self) -> Vec<RuleRef> {
        self.instructions
            .iter()
            .flat_map(|instruction| match instruction {
                HepInstruction::RuleInstance(rule) => vec![rule.clone()],
                HepInstruction::RuleCollection(rules) => rules.clone(),
                HepInstruction::Subprogram(program) => program.rules(),
                _ => vec![],
            })
            .collect()
    }
}

/// Builds a [`HepProgram`].
///
/// ```
/// use std::sync::Arc;
/// use relopt::heuristic::{HepProgramBuilder, MatchOrder};
/// use relopt::rules::{RemoveLimitRule, RemoveTrivialFilterRule};
///
/// let program = HepProgramBuilder::new()
///     .add_match_order(MatchOrder::BottomUp)
///     .add_group_begin()
///     .add_rule_instance(Arc::new(RemoveTrivialFilterRule::new()))
///     .add_rule_instance(Arc::new(RemoveLimitRule::new()))
///     .add_group_end()
///     .build()
///     .unwrap();
/// assert_eq!(5, program.instructions().len());
/// ```
#[derive(Default)]
pub struct HepProgramBuilder {
    instructions: Vec<HepInstruction>,
}

impl HepProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, instruction: HepInstruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn add_rule_instance(self, rule: RuleRef) -> Self {
        self.add(HepInstruction::RuleInstance(rule))
    }

    pub fn add_rule_by_description<S: Into<String>>(self, description: S) -> Self {
        self.add(HepInstruction::RuleByDescription(description.into()))
    }

    pub fn add_rule_class(self, predicate: RuleClassPredicate) -> Self {
        self.add(HepInstruction::RuleClass(predicate))
    }

    pub fn add_rule_collection(self, rules: Vec<RuleRef>) -> Self {
        self.add(HepInstruction::RuleCollection(rules))
    }

    pub fn add_converters(self, guaranteed: bool) -> Self {
        self.add(HepInstruction::ConverterRules { guaranteed })
    }

    pub fn add_common_rel_sub_expr_instruction(self) -> Self {
        self.add(HepInstruction::CommonRelSubExprRules)
    }

    pub fn add_match_order(self, order: MatchOrder) -> Self {
        self.add(HepInstruction::MatchOrder(order))
    }

    pub fn add_match_limit(self, limit: usize) -> Self {
        self.add(HepInstruction::MatchLimit(limit))
    }

    pub fn add_sub_program(self, program: HepProgram) -> Self {
        self.add(HepInstruction::Subprogram(program))
    }

    pub fn add_group_begin(self) -> Self {
        self.add(HepInstruction::BeginGroup)
    }

    pub fn add_group_end(self) -> Self {
        self.add(HepInstruction::EndGroup)
    }

    /// Checks that groups are balanced, not nested, and only contain rules.
    pub fn build(self) -> OptResult<HepProgram> {
        let mut in_group = false;
        for instruction in &self.instructions {
            match instruction {
                HepInstruction::BeginGroup if in_group => {
                    return Err(OptimizerError::InvalidProgram("Nested group".to_string()).into())
                }
                HepInstruction::BeginGroup => in_group = true,
                HepInstruction::EndGroup if !in_group => {
                    return Err(OptimizerError::InvalidProgram(
                        "Group end without group begin".to_string(),
                    )
                    .into())
                }
                HepInstruction::EndGroup => in_group = false,
                HepInstruction::ConverterRules { .. } | HepInstruction::CommonRelSubExprRules
                    if in_group =>
                {
                    return Err(OptimizerError::InvalidProgram(format!(
                        "{:?} can't be part of a group",
                        instruction
                    ))
                    .into())
                }
                _ => {}
            }
        }
        if in_group {
            return Err(OptimizerError::InvalidProgram("Unclosed group".to_string()).into());
        }

        Ok(HepProgram {
            instructions: self.instructions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::rules::{RemoveLimitRule, RemoveTrivialFilterRule};

    fn invalid_program_message(builder: HepProgramBuilder) -> String {
        let err = builder.build().unwrap_err();
        match err.downcast_ref::<OptimizerError>() {
            Some(OptimizerError::InvalidProgram(message)) => message.clone(),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_group_validation() {
        assert_eq!(
            "Unclosed group",
            invalid_program_message(HepProgramBuilder::new().add_group_begin())
        );
        assert_eq!(
            "Nested group",
            invalid_program_message(
                HepProgramBuilder::new()
                    .add_group_begin()
                    .add_group_begin()
                    .add_group_end()
                    .add_group_end()
            )
        );
        assert_eq!(
            "Group end without group begin",
            invalid_program_message(HepProgramBuilder::new().add_group_end())
        );
        assert!(invalid_program_message(
            HepProgramBuilder::new()
                .add_group_begin()
                .add_converters(true)
                .add_group_end()
        )
        .contains("ConverterRules"));
    }

    #[test]
    fn test_rules_of_program() {
        let sub_program = HepProgramBuilder::new()
            .add_rule_instance(Arc::new(RemoveLimitRule::new()))
            .build()
            .unwrap();
        let program = HepProgramBuilder::new()
            .add_rule_collection(vec![Arc::new(RemoveTrivialFilterRule::new())])
            .add_rule_by_description("NotARule")
            .add_sub_program(sub_program)
            .build()
            .unwrap();

        let descriptions = program
            .rules()
            .iter()
            .map(|r| r.description().to_string())
            .collect::<Vec<String>>();
        assert_eq!(
            vec!["RemoveTrivialFilterRule", "RemoveLimitRule"],
            descriptions
        );
    }
}
