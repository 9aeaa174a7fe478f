//! Optimization rules.
//!
//! A rule defines an equivalent transformation of a query plan. Each rule declares a
//! [`RuleOperand`] tree describing the shape of expressions it operates on, and an
//! [`Rule::on_match`] callback which receives the matched expressions through a [`RuleCall`] and
//! registers zero or more equivalent replacements with [`RuleCall::transform_to`].
//!
//! Let us use the [`RemoveLimitRule`] to illustrate, its operand is defined as following:
//! ```no
//! static ref REMOVE_LIMIT_OPERAND: RuleOperand =
//!     RuleOperand::new(OperatorKind::Limit).inputs(vec![RuleOperand::new(OperatorKind::Limit)]);
//! ```
//!
//! When the optimizer finds a `Limit` whose single input is a `Limit`, the call carries both
//! nodes in pre-order, `call.rel(0)` being the outer limit. Inputs of matched nodes that are not
//! themselves matched are opaque placeholders, so a rule never needs to know how the optimizer
//! stores the plan:
//!```no
//!     [Limit(10)]                                   [Limit(5)]
//!          |                                            |
//!          |              RemoveLimitRule               |
//!     [Limit(5)]             -------->               [#2]
//!          |
//!        [#2]
//! ```
//!
//! Rules come in four kinds, see [`RuleKind`]. Converter rules and common sub expression rules
//! are only fired by the optimizer when the surrounding graph asks for them.
mod call;
pub use call::*;
mod convert;
pub use convert::*;
mod filter;
pub use filter::*;
mod limit;
pub use limit::*;
mod operand;
pub use operand::*;

use std::fmt::Debug;
use std::sync::Arc;

use strum_macros::AsRefStr;

use crate::error::OptResult;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, AsRefStr)]
pub enum RuleKind {
    /// Ordinary rewrite, fired wherever its operand matches.
    Transformation,
    /// Changes convention of an expression, see [`ConverterRule`].
    Converter,
    /// Pulls a converter into the parent expecting its output, see [`TraitMatchingRule`].
    TraitMatching,
    /// Only fired on expressions with at least two parents. The call carries those parents.
    CommonRelSubExpr,
}

/// A rule should only focus on providing equivalent transformations of matched expressions.
pub trait Rule: Debug {
    /// Unique name of the rule.
    fn description(&self) -> &str;

    /// Pattern for rule.
    fn operand(&self) -> &RuleOperand;

    fn kind(&self) -> RuleKind {
        RuleKind::Transformation
    }

    /// Side condition checked after operands matched and before the rule fires.
    fn matches(&self, _call: &RuleCall) -> bool {
        true
    }

    /// Apply a rule to matched expressions, reporting results through `call`.
    fn on_match(&self, call: &mut RuleCall) -> OptResult<()>;

    fn as_converter(&self) -> Option<&ConverterRule> {
        None
    }
}

pub type RuleRef = Arc<dyn Rule>;
