use std::sync::Arc;

use arrow_schema::{Field, FieldRef, Schema, SchemaRef};
use datafusion_common::JoinType;
use datafusion_expr::Expr;

use crate::error::OptResult;
use crate::operator::{
    guess_selectivity, input_row_type, input_rows, DigestMode, OperatorTrait, Term,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    join_type: JoinType,
    condition: Expr,
}

impl Join {
    pub fn new(join_type: JoinType, condition: Expr) -> Self {
        Self {
            join_type,
            condition,
        }
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn condition(&self) -> &Expr {
        &self.condition
    }
}

impl OperatorTrait for Join {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        let left = input_row_type(inputs, 0)?;
        let right = input_row_type(inputs, 1)?;
        match self.join_type {
            JoinType::LeftSemi | JoinType::LeftAnti => Ok(left.clone()),
            JoinType::RightSemi | JoinType::RightAnti => Ok(right.clone()),
            join_type => {
                let left_nullable = matches!(join_type, JoinType::Right | JoinType::Full);
                let right_nullable = matches!(join_type, JoinType::Left | JoinType::Full);
                let fields = left
                    .fields()
                    .iter()
                    .map(|f| nullable_if(f, left_nullable))
                    .chain(right.fields().iter().map(|f| nullable_if(f, right_nullable)))
                    .collect::<Vec<Field>>();
                Ok(Arc::new(Schema::new(fields)))
            }
        }
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        let left = input_rows(rows, 0);
        let right = input_rows(rows, 1);
        let product = left * right * guess_selectivity(&self.condition);
        match self.join_type {
            JoinType::Inner => product,
            JoinType::Left => product.max(left),
            JoinType::Right => product.max(right),
            JoinType::Full => product.max(left).max(right),
            JoinType::LeftSemi | JoinType::LeftAnti => left * 0.5,
            _ => right * 0.5,
        }
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![
            ("type", self.join_type.to_string()),
            ("condition", self.condition.to_string()),
        ]
    }
}

fn nullable_if(field: &FieldRef, nullable: bool) -> Field {
    let field = field.as_ref().clone();
    if nullable {
        field.with_nullable(true)
    } else {
        field
    }
}
