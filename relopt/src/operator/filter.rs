use arrow_schema::SchemaRef;
use datafusion_common::ScalarValue;
use datafusion_expr::utils::split_conjunction;
use datafusion_expr::{Expr, Operator as BinaryOp};

use crate::error::OptResult;
use crate::operator::{input_row_type, input_rows, DigestMode, OperatorTrait, Term};

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    condition: Expr,
}

impl Filter {
    pub fn new(condition: Expr) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &Expr {
        &self.condition
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self.condition, Expr::Literal(ScalarValue::Boolean(Some(true))))
    }

    pub fn is_always_false(&self) -> bool {
        matches!(
            self.condition,
            Expr::Literal(ScalarValue::Boolean(Some(false))) | Expr::Literal(ScalarValue::Null)
        )
    }
}

/// Guesses the fraction of rows passing `predicate`, conjunct by conjunct.
pub fn guess_selectivity(predicate: &Expr) -> f64 {
    split_conjunction(predicate)
        .into_iter()
        .map(|conjunct| match conjunct {
            Expr::Literal(ScalarValue::Boolean(Some(true))) => 1.0,
            Expr::Literal(ScalarValue::Boolean(Some(false))) => 0.0,
            Expr::IsNotNull(_) => 0.9,
            Expr::BinaryExpr(binary) => match binary.op {
                BinaryOp::Eq => 0.15,
                BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 0.5,
                _ => 0.25,
            },
            Expr::Between(_) => 0.5,
            _ => 0.25,
        })
        .product()
}

impl OperatorTrait for Filter {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        input_row_type(inputs, 0).cloned()
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        input_rows(rows, 0) * guess_selectivity(&self.condition)
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![("condition", self.condition.to_string())]
    }
}
