use arrow_schema::SchemaRef;

use crate::error::OptResult;
use crate::operator::{DigestMode, OperatorTrait, Term};
use crate::stat::Statistics;

/// Row count assumed for a table without statistics.
pub const DEFAULT_TABLE_ROW_COUNT: f64 = 100.0;

#[derive(Clone, Debug, PartialEq)]
pub struct TableScan {
    table_name: String,
    schema: SchemaRef,
    limit: Option<usize>,
    statistics: Option<Statistics>,
}

impl TableScan {
    pub fn new<S: Into<String>>(table_name: S, schema: SchemaRef) -> Self {
        Self {
            table_name: table_name.into(),
            schema,
            limit: None,
            statistics: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_statistics(mut self, statistics: Statistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }
}

impl OperatorTrait for TableScan {
    fn derive_row_type(&self, _inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        Ok(self.schema.clone())
    }

    fn estimate_row_count(&self, _input_rows: &[f64]) -> f64 {
        let rows = self
            .statistics
            .as_ref()
            .map(|s| s.row_count())
            .unwrap_or(DEFAULT_TABLE_ROW_COUNT);
        match self.limit {
            Some(limit) => rows.min(limit as f64),
            None => rows,
        }
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        let mut terms = vec![("table", self.table_name.clone())];
        if let Some(limit) = self.limit {
            terms.push(("limit", limit.to_string()));
        }
        terms
    }
}
