//! AST module for queries and filter conditions.

mod condition;
mod query;

pub use condition::{Comparison, Condition, LogicalOp, SimpleOperator};
pub use query::{Ast, CorrelatedSubquery, Correlation};
pub use ripple_incremental::{Aggregate, AggregateFn, ExistsType};
