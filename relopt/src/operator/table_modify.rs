use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use strum_macros::{AsRefStr, Display};

use crate::error::OptResult;
use crate::operator::{input_rows, DigestMode, OperatorTrait, Term};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, AsRefStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ModifyOperation {
    Insert,
    Update,
    Delete,
    Merge,
}

/// Writes rows of its input into a table, producing the number of affected rows.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableModify {
    table_name: String,
    operation: ModifyOperation,
}

impl TableModify {
    pub fn new<S: Into<String>>(table_name: S, operation: ModifyOperation) -> Self {
        Self {
            table_name: table_name.into(),
            operation,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn operation(&self) -> ModifyOperation {
        self.operation
    }
}

impl OperatorTrait for TableModify {
    fn derive_row_type(&self, _inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        Ok(Arc::new(Schema::new(vec![Field::new(
            "ROWCOUNT",
            DataType::Int64,
            false,
        )])))
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        input_rows(rows, 0)
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![
            ("table", self.table_name.clone()),
            ("operation", self.operation.to_string()),
        ]
    }
}
