use anyhow::ensure;
use arrow_schema::SchemaRef;
use strum_macros::{AsRefStr, Display};

use crate::error::OptResult;
use crate::operator::{input_row_type, DigestMode, OperatorTrait, Term};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, AsRefStr, Display)]
pub enum SetOpKind {
    Union,
    Intersect,
    Minus,
}

/// Union, intersect or minus of two or more inputs with the same number of fields.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SetOp {
    kind: SetOpKind,
    all: bool,
}

impl SetOp {
    pub fn new(kind: SetOpKind, all: bool) -> Self {
        Self { kind, all }
    }

    pub fn kind(&self) -> SetOpKind {
        self.kind
    }

    pub fn all(&self) -> bool {
        self.all
    }
}

impl OperatorTrait for SetOp {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        let first = input_row_type(inputs, 0)?;
        for input in &inputs[1..] {
            ensure!(
                input.fields().len() == first.fields().len(),
                "{} inputs have different field counts: {} and {}",
                self.kind,
                first.fields().len(),
                input.fields().len()
            );
        }
        Ok(first.clone())
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        let estimate = match self.kind {
            SetOpKind::Union => rows.iter().sum::<f64>(),
            SetOpKind::Intersect => rows.iter().copied().fold(f64::INFINITY, f64::min),
            SetOpKind::Minus => rows.first().copied().unwrap_or(0.0),
        };
        let estimate = if estimate.is_finite() { estimate } else { 0.0 };
        if self.all {
            estimate
        } else {
            estimate * 0.5
        }
    }

    fn terms(&self, _mode: DigestMode) -> Vec<Term> {
        vec![("kind", self.kind.to_string()), ("all", self.all.to_string())]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema};

    use super::*;

    #[test]
    fn test_set_op() {
        let one = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, false)]));
        let two = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int32, false),
            Field::new("b", DataType::Int32, false),
        ]));

        let union = SetOp::new(SetOpKind::Union, true);
        assert_eq!(one, union.derive_row_type(&[one.clone(), one.clone()]).unwrap());
        assert!(union.derive_row_type(&[one, two]).is_err());

        assert_eq!(30.0, union.estimate_row_count(&[10.0, 20.0]));
        assert_eq!(15.0, SetOp::new(SetOpKind::Union, false).estimate_row_count(&[10.0, 20.0]));
        assert_eq!(5.0, SetOp::new(SetOpKind::Intersect, false).estimate_row_count(&[10.0, 20.0]));
    }
}
