use std::cmp::min;
use std::sync::Arc;

use anyhow::bail;

use crate::error::OptResult;
use crate::operator::{Limit, Operator, OperatorKind};
use crate::plan::PlanNode;
use crate::rules::{Rule, RuleCall, RuleOperand};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref REMOVE_LIMIT_RULE_OPERAND: RuleOperand = {
        RuleOperand::new(OperatorKind::Limit)
          .inputs(vec![RuleOperand::new(OperatorKind::Limit)])
    };
    static ref PUSH_LIMIT_OVER_PROJECTION_OPERAND: RuleOperand = {
        RuleOperand::new(OperatorKind::Limit)
          .inputs(vec![RuleOperand::new(OperatorKind::Projection)])
    };
    static ref PUSH_LIMIT_TO_TABLE_SCAN_OPERAND: RuleOperand = {
        RuleOperand::new(OperatorKind::Limit)
          .inputs(vec![RuleOperand::new(OperatorKind::TableScan)])
    };
}

/// Swaps a limit with the projection below it.
#[derive(Clone, Debug, Default)]
pub struct PushLimitOverProjectionRule {}

impl PushLimitOverProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushLimitOverProjectionRule {
    fn description(&self) -> &str {
        "PushLimitOverProjectionRule"
    }

    fn operand(&self) -> &RuleOperand {
        &PUSH_LIMIT_OVER_PROJECTION_OPERAND
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        let limit = call.rel(0).clone();
        let projection = call.rel(1).clone();

        let new_limit = PlanNode::new(
            limit.operator().clone(),
            projection.inputs().to_vec(),
            limit.traits().clone(),
        )?;
        call.transform_to(projection.copy_with_inputs(vec![Arc::new(new_limit)]));

        Ok(())
    }
}

/// Merges two adjacent limits.
#[derive(Clone, Debug, Default)]
pub struct RemoveLimitRule {}

impl RemoveLimitRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for RemoveLimitRule {
    fn description(&self) -> &str {
        "RemoveLimitRule"
    }

    fn operand(&self) -> &RuleOperand {
        &REMOVE_LIMIT_RULE_OPERAND
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        if let (Operator::Limit(limit1), Operator::Limit(limit2)) =
            (call.rel(0).operator(), call.rel(1).operator())
        {
            let new_limit = min(limit1.limit(), limit2.limit());
            let ret = call
                .rel(1)
                .copy_with_operator(Operator::Limit(Limit::new(new_limit)));

            call.transform_to(ret);
            Ok(())
        } else {
            bail!("Operand miss matched")
        }
    }
}

/// Folds a limit into the table scan below it.
#[derive(Clone, Debug, Default)]
pub struct PushLimitToTableScanRule {}

impl PushLimitToTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushLimitToTableScanRule {
    fn description(&self) -> &str {
        "PushLimitToTableScanRule"
    }

    fn operand(&self) -> &RuleOperand {
        &PUSH_LIMIT_TO_TABLE_SCAN_OPERAND
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        if let (Operator::Limit(limit), Operator::TableScan(scan)) =
            (call.rel(0).operator(), call.rel(1).operator())
        {
            let new_limit = scan
                .limit()
                .map(|l1| min(l1, limit.limit()))
                .unwrap_or_else(|| limit.limit());

            let ret = call
                .rel(1)
                .copy_with_operator(Operator::TableScan(scan.clone().with_limit(new_limit)));

            call.transform_to(ret);
            Ok(())
        } else {
            bail!("Operand miss matched!")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion_expr::col;

    use crate::plan::explain::explain_to_string;
    use crate::plan::LogicalPlanBuilder;
    use crate::rules::{
        PushLimitOverProjectionRule, PushLimitToTableScanRule, RemoveLimitRule, Rule, RuleRef,
    };
    use crate::test_utils::{optimize_with_rules, t1_schema};

    #[test]
    fn test_push_limit_over_projection_operand() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", t1_schema())
            .unwrap()
            .limit(5)
            .unwrap()
            .projection(vec![col("c1")])
            .unwrap()
            .limit(10)
            .unwrap()
            .build()
            .unwrap();

        let rule = PushLimitOverProjectionRule::new();
        assert!(rule.operand().matches(&original_plan.root()));
    }

    #[test]
    fn test_limit_merge() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", t1_schema())
            .unwrap()
            .limit(5)
            .unwrap()
            .limit(10)
            .unwrap()
            .build()
            .unwrap();
        let rules: Vec<RuleRef> = vec![Arc::new(RemoveLimitRule::new())];

        let expected = "\
Limit.NONE(limit=5)
└─ TableScan.NONE(table=t1)
";
        assert_eq!(
            expected,
            explain_to_string(&optimize_with_rules(original_plan, rules)).unwrap()
        );
    }

    #[test]
    fn test_push_limit_to_table_scan() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", t1_schema())
            .unwrap()
            .limit(10)
            .unwrap()
            .projection(vec![col("c1")])
            .unwrap()
            .limit(5)
            .unwrap()
            .build()
            .unwrap();
        let rules: Vec<RuleRef> = vec![
            Arc::new(PushLimitOverProjectionRule::new()),
            Arc::new(RemoveLimitRule::new()),
            Arc::new(PushLimitToTableScanRule::new()),
        ];

        let expected = "\
Projection.NONE(exprs=[c1], names=[c1])
└─ TableScan.NONE(table=t1, limit=5)
";
        assert_eq!(
            expected,
            explain_to_string(&optimize_with_rules(original_plan, rules)).unwrap()
        );
    }
}
