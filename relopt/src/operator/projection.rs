use std::sync::Arc;

use anyhow::ensure;
use arrow_schema::{Field, Schema, SchemaRef};
use datafusion_common::DFSchema;
use datafusion_expr::{Expr, ExprSchemable};
use itertools::Itertools;

use crate::error::OptResult;
use crate::operator::{input_row_type, input_rows, DigestMode, OperatorTrait, Term};

#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    exprs: Vec<Expr>,
    /// Output column names, one per expression.
    names: Vec<String>,
}

impl Projection {
    pub fn new<I: IntoIterator<Item = Expr>>(exprs: I) -> Self {
        let exprs: Vec<Expr> = exprs.into_iter().collect();
        let names = exprs.iter().map(|e| e.schema_name().to_string()).collect();
        Self { exprs, names }
    }

    pub fn with_names(exprs: Vec<Expr>, names: Vec<String>) -> Self {
        Self { exprs, names }
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl OperatorTrait for Projection {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        ensure!(
            self.exprs.len() == self.names.len(),
            "Projection has {} expressions but {} names",
            self.exprs.len(),
            self.names.len()
        );
        let input_schema = DFSchema::try_from(input_row_type(inputs, 0)?.as_ref().clone())?;
        let fields = self
            .exprs
            .iter()
            .zip(self.names.iter())
            .map(|(expr, name)| -> OptResult<Field> {
                Ok(Field::new(
                    name,
                    expr.get_type(&input_schema)?,
                    expr.nullable(&input_schema)?,
                ))
            })
            .collect::<OptResult<Vec<Field>>>()?;

        Ok(Arc::new(Schema::new(fields)))
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        input_rows(rows, 0)
    }

    fn terms(&self, mode: DigestMode) -> Vec<Term> {
        match mode {
            DigestMode::Full => vec![
                ("exprs", format!("[{}]", self.exprs.iter().join(", "))),
                ("names", format!("[{}]", self.names.iter().join(", "))),
            ],
            DigestMode::Normalized => vec![(
                "exprs",
                format!(
                    "[{}]",
                    self.exprs.iter().map(|e| e.clone().unalias()).join(", ")
                ),
            )],
        }
    }
}
