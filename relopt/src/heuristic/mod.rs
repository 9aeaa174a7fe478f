//! Implementation of heuristic optimizer.
//!
//! Heuristic optimizer optimizes query plan by executing a program of instructions, each of
//! which applies some rules to the plan until some condition is met, e.g. max number of matches
//! or reached fixed point. The implementation is heavily inspired by
//! [apache calcite](https://github.com/apache/calcite)'s HepPlanner.
//!
//! The plan is kept in a graph of vertices, each holding exactly one expression whose inputs are
//! placeholders of other vertices. A vertex keeps its identity while rules replace its
//! expression, so structurally identical sub plans can share one vertex, see
//! [`HepOptimizerBuilder::with_dag`].
//!
//! Heuristic optimization is useful in several cases. For example, it can be used to preprocess
//! logical plan before sending to cost base optimizer. Also, in oltp or time series database which
//! serves highly concurrent point queries(plan is relative simple, and query result is small),
//! we may only use heuristic optimizer to reduce optimization time.

mod optimizer;
pub use optimizer::*;
mod graph;
pub use graph::*;
mod binding;
mod program;
pub use program::*;
