use arrow_schema::SchemaRef;
use datafusion_common::ScalarValue;
use itertools::Itertools;

use crate::error::OptResult;
use crate::operator::{DigestMode, OperatorTrait, Term};

/// Literal rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Values {
    schema: SchemaRef,
    tuples: Vec<Vec<ScalarValue>>,
}

impl Values {
    pub fn new(schema: SchemaRef, tuples: Vec<Vec<ScalarValue>>) -> Self {
        Self { schema, tuples }
    }

    pub fn tuples(&self) -> &[Vec<ScalarValue>] {
        &self.tuples
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl OperatorTrait for Values {
    fn derive_row_type(&self, _inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        Ok(self.schema.clone())
    }

    fn estimate_row_count(&self, _input_rows: &[f64]) -> f64 {
        self.tuples.len() as f64
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        let tuples = self
            .tuples
            .iter()
            .map(|t| format!("[{}]", t.iter().join(", ")))
            .join(", ");
        vec![("tuples", format!("[{}]", tuples))]
    }
}
