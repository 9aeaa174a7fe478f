use arrow_schema::SchemaRef;

use crate::error::OptResult;
use crate::operator::{input_row_type, input_rows, DigestMode, OperatorTrait, Term};
use crate::properties::Convention;

/// Changes convention of its input from `from` to `to` without changing its result.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Converter {
    from: Convention,
    to: Convention,
}

impl Converter {
    pub fn new(from: Convention, to: Convention) -> Self {
        Self { from, to }
    }

    pub fn from_convention(&self) -> Convention {
        self.from
    }

    pub fn to_convention(&self) -> Convention {
        self.to
    }
}

impl OperatorTrait for Converter {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        input_row_type(inputs, 0).cloned()
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        input_rows(rows, 0)
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![("from", self.from.to_string())]
    }
}

/// Placeholder requesting the traits of its node for its input.
///
/// It has infinite cost and only exists to be expanded into concrete converters.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct AbstractConverter {}

impl OperatorTrait for AbstractConverter {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        input_row_type(inputs, 0).cloned()
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        input_rows(rows, 0)
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![]
    }
}
