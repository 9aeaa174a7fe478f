use std::fmt::{Display, Formatter};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use itertools::Itertools;
use strum_macros::AsRefStr;

use crate::error::OptResult;
use crate::operator::{input_row_type, input_rows, DigestMode, OperatorTrait, Term};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

/// One aggregate function applied to an input field.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct AggregateCall {
    func: AggregateFunction,
    /// Input field index, `None` for `COUNT(*)`.
    arg: Option<usize>,
    distinct: bool,
    name: String,
}

impl AggregateCall {
    pub fn new<S: Into<String>>(func: AggregateFunction, arg: Option<usize>, name: S) -> Self {
        Self {
            func,
            arg,
            distinct: false,
            name: name.into(),
        }
    }

    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn func(&self) -> AggregateFunction {
        self.func
    }

    pub fn arg(&self) -> Option<usize> {
        self.arg
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn output_field(&self, input: &Schema) -> OptResult<Field> {
        let arg_field = match self.arg {
            Some(idx) => Some(input.fields().get(idx).ok_or_else(|| {
                anyhow!("Aggregate argument {} out of range in {:?}", idx, input)
            })?),
            None => None,
        };

        let (data_type, nullable) = match (self.func, arg_field) {
            (AggregateFunction::Count, _) => (DataType::Int64, false),
            (AggregateFunction::Avg, Some(_)) => (DataType::Float64, true),
            (_, Some(field)) => (field.data_type().clone(), true),
            (func, None) => bail!("{} requires an argument", func.as_ref()),
        };

        Ok(Field::new(&self.name, data_type, nullable))
    }
}

impl Display for AggregateCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.func.as_ref())?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        match self.arg {
            Some(idx) => write!(f, "${})", idx),
            None => write!(f, "*)"),
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Aggregate {
    group_keys: Vec<usize>,
    calls: Vec<AggregateCall>,
}

impl Aggregate {
    pub fn new(group_keys: Vec<usize>, calls: Vec<AggregateCall>) -> Self {
        Self { group_keys, calls }
    }

    pub fn group_keys(&self) -> &[usize] {
        &self.group_keys
    }

    pub fn calls(&self) -> &[AggregateCall] {
        &self.calls
    }
}

impl OperatorTrait for Aggregate {
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef> {
        let input = input_row_type(inputs, 0)?;
        let mut fields = self
            .group_keys
            .iter()
            .map(|idx| {
                input
                    .fields()
                    .get(*idx)
                    .map(|f| f.as_ref().clone())
                    .ok_or_else(|| anyhow!("Group key {} out of range in {:?}", idx, input))
            })
            .collect::<OptResult<Vec<Field>>>()?;
        for call in &self.calls {
            fields.push(call.output_field(input)?);
        }

        Ok(Arc::new(Schema::new(fields)))
    }

    fn estimate_row_count(&self, rows: &[f64]) -> f64 {
        if self.group_keys.is_empty() {
            1.0
        } else {
            (input_rows(rows, 0) * 0.1).max(1.0)
        }
    }

    fn terms(&self, mode: DigestMode) -> Vec<Term> {
        let calls = match mode {
            DigestMode::Full => self
                .calls
                .iter()
                .map(|c| format!("{} AS {}", c, c.name))
                .join(", "),
            DigestMode::Normalized => self.calls.iter().join(", "),
        };
        vec![
            ("group", format!("[{}]", self.group_keys.iter().join(", "))),
            ("calls", format!("[{}]", calls)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_row_type() {
        let input = Arc::new(Schema::new(vec![
            Field::new("k", DataType::Utf8, false),
            Field::new("v", DataType::Int32, false),
        ]));
        let agg = Aggregate::new(
            vec![0],
            vec![
                AggregateCall::new(AggregateFunction::Count, None, "cnt"),
                AggregateCall::new(AggregateFunction::Avg, Some(1), "avg_v"),
                AggregateCall::new(AggregateFunction::Max, Some(1), "max_v").with_distinct(),
            ],
        );

        let row_type = agg.derive_row_type(&[input.clone()]).unwrap();
        assert_eq!(
            vec!["k", "cnt", "avg_v", "max_v"],
            row_type.fields().iter().map(|f| f.name().as_str()).collect::<Vec<_>>()
        );
        assert_eq!(&DataType::Float64, row_type.field(2).data_type());
        assert_eq!(&DataType::Int32, row_type.field(3).data_type());

        let invalid = Aggregate::new(
            vec![],
            vec![AggregateCall::new(AggregateFunction::Sum, None, "s")],
        );
        assert!(invalid.derive_row_type(&[input]).is_err());
    }

    #[test]
    fn test_terms() {
        let agg = Aggregate::new(
            vec![0, 1],
            vec![AggregateCall::new(AggregateFunction::Count, Some(2), "c").with_distinct()],
        );
        assert_eq!(
            vec![
                ("group", "[0, 1]".to_string()),
                ("calls", "[COUNT(DISTINCT $2)]".to_string())
            ],
            agg.terms(DigestMode::Normalized)
        );
        assert_eq!(1.0, Aggregate::new(vec![], vec![]).estimate_row_count(&[50.0]));
        assert_eq!(5.0, agg.estimate_row_count(&[50.0]));
    }
}
