//! ## Background
//!
//! The query optimizer accepts an unoptimized query plan, and outputs an equivalent plan which
//! is cheaper to execute. Rule based optimization applies a collection of rewrite rules to a
//! query plan repeatedly until some condition is met, for example, a fix point (plan no longer
//! changes) or a number of matches. Each rule is a substitution: the optimizer substitutes the
//! rule generated expression for the matched one, choosing by cost when a rule proposes several.
//! This is useful for heuristic rewrites, for example, removing trivial filters, merging
//! limits, or preparing a logical plan before handing it to a cost based search.
//!
//! Besides rewrite rules, the crate models physical properties of expressions as traits. A
//! convention trait describes how an expression is implemented, and converter rules move
//! expressions between conventions. When some expression requires traits its input does not
//! provide, an abstract converter records the request and is later expanded into a chain of
//! concrete converters.
//!
//! ## Design
//!
//! * [`heuristic`] Program driven heuristic optimizer, see [`heuristic::HepOptimizer`].
//! * [`operator`] Relational operators.
//! * [`plan`] Plan nodes, digests and explain.
//! * [`properties`] Traits, conventions and collations.
//! * [`rules`] Optimization rule protocol, converter rules and some example rules.
//! * [`cost`] Cost and pluggable cost model.
//! * [`listener`] Observers of rule firings.
//!
//! ## Reference
//!
//! 1. Begoli, E., Camacho-Rodríguez, J., Hyde, J., Mior, M.J. and Lemire, D., 2018. Apache
//! Calcite: A foundational framework for optimized query processing over heterogeneous data
//! sources. In Proceedings of the 2018 International Conference on Management of Data
//! (pp. 221-230).
//! 2. Graefe, G. and McKenna, W.J., 1993. The volcano optimizer generator: Extensibility and
//! efficient search. In Proceedings of IEEE 9th international conference on data engineering
//! (pp. 209-218).

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod cost;
pub mod error;
pub mod heuristic;
pub mod listener;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod properties;
pub mod rules;
pub mod stat;

#[cfg(test)]
mod test_utils;
