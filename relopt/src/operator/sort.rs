use arrow_schema::SchemaRef;

use crate::error::OptResult;
use crate::operator::{input_row_type, input_rows, DigestMode, OperatorTrait, Term};
use crate::properties::Collation;

/// Sorts its input, optionally keeping only the first `fetch` rows.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    collation: Collation,
    fetch: Option<usize>,
}

impl Sort {
    pub fn new(collation: Collation) -> Self {
        Self {
            collation,
            fetch: None,
        }
    }

    pub fn with_fetch(mut self, fetch: usize) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn collation(&self) -> &Collation {
        &self.collation
    }

    pub fn fetch(&self) -> Option<usize> {
        self.fetch
    }
}

impl OperatorTrait for Sort {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        input_row_type(inputs, 0).cloned()
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        let rows = input_rows(rows, 0);
        match self.fetch {
            Some(fetch) => rows.min(fetch as f64),
            None => rows,
        }
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        let mut terms = vec![("collation", self.collation.to_string())];
        if let Some(fetch) = self.fetch {
            terms.push(("fetch", fetch.to_string()));
        }
        terms
    }
}
