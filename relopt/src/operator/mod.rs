//! Contains relational operators such as join, projection, limit, etc.
//!
//! All operators live in one [`Operator`] enum. There is no separate logical or physical
//! hierarchy: whether a node is logical or physical is decided by the convention in its trait
//! set, so that converter rules can move a node between conventions without changing its
//! operator.
mod aggregate;
pub use aggregate::*;
mod converter;
pub use converter::*;
mod filter;
pub use filter::*;
mod join;
pub use join::*;
mod limit;
pub use limit::*;
mod projection;
pub use projection::*;
mod set_op;
pub use set_op::*;
mod sort;
pub use sort::*;
mod table_modify;
pub use table_modify::*;
mod table_scan;
pub use table_scan::*;
mod values;
pub use values::*;
mod vertex;
pub use vertex::*;

use anyhow::anyhow;
use arrow_schema::SchemaRef;
use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::{AsRefStr, EnumDiscriminants};

use crate::error::OptResult;

/// Controls what goes into a digest.
///
/// `Full` includes output column names, `Normalized` leaves them out so that expressions that only
/// differ in naming of projected columns share one digest.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Default)]
pub enum DigestMode {
    Full,
    #[default]
    Normalized,
}

impl DigestMode {
    pub(crate) fn index(self) -> usize {
        match self {
            DigestMode::Full => 0,
            DigestMode::Normalized => 1,
        }
    }
}

/// An attribute of an operator, as `(name, value)`.
pub type Term = (&'static str, String);

#[enum_dispatch(Operator)]
pub trait OperatorTrait {
    /// Derives output row type from row types of inputs.
    fn derive_row_type(&self, inputs: &[SchemaRef]) -> OptResult<SchemaRef>;

    /// Estimates output row count from row counts of inputs.
    fn estimate_row_count(&self, input_rows: &[f64]) -> f64;

    /// Attributes of this operator taking part in digest and explain, inputs excluded.
    fn terms(&self, mode: DigestMode) -> Vec<Term>;
}

#[enum_dispatch]
#[derive(Clone, Debug, PartialEq, EnumAsInner, AsRefStr, EnumDiscriminants)]
#[strum_discriminants(name(OperatorKind), derive(Hash, AsRefStr))]
pub enum Operator {
    TableScan(TableScan),
    Filter(Filter),
    Projection(Projection),
    Join(Join),
    Aggregate(Aggregate),
    Sort(Sort),
    Limit(Limit),
    SetOp(SetOp),
    Values(Values),
    TableModify(TableModify),
    Converter(Converter),
    AbstractConverter(AbstractConverter),
    Vertex(Vertex),
}

impl Operator {
    pub fn kind(&self) -> OperatorKind {
        OperatorKind::from(self)
    }

    /// Converters change traits of their input without changing its result.
    pub fn is_converter(&self) -> bool {
        matches!(self, Operator::Converter(_) | Operator::AbstractConverter(_))
    }
}

pub(crate) fn input_row_type(inputs: &[SchemaRef], idx: usize) -> OptResult<&SchemaRef> {
    inputs
        .get(idx)
        .ok_or_else(|| anyhow!("Missing input {} to derive row type", idx))
}

pub(crate) fn input_rows(input_rows: &[f64], idx: usize) -> f64 {
    input_rows.get(idx).copied().unwrap_or(1.0)
}
