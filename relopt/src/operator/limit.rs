use arrow_schema::SchemaRef;

use crate::error::OptResult;
use crate::operator::{input_row_type, input_rows, DigestMode, OperatorTrait, Term};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Limit {
    limit: usize,
}

impl Limit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl OperatorTrait for Limit {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        input_row_type(inputs, 0).cloned()
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        input_rows(rows, 0).min(self.limit as f64)
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![("limit", self.limit.to_string())]
    }
}
