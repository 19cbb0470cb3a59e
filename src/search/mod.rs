//! Query-side machinery: the batched executor, structured row filters, and
//! the graph re-ranker.

pub mod executor;
pub mod filters;
pub mod graph;

#[cfg(test)]
mod executor_tests;

pub use executor::{execute_batch, execute_one, ExecuteOptions};
pub use filters::{parse_filter, parse_order_by, FilterExpr, OrderBy};
pub use graph::{rerank_batch, EdgeStore, GraphOptions};
