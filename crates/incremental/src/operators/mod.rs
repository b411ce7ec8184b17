//! Pipeline operators.
//!
//! - [`Filter`]: keeps rows satisfying a predicate
//! - [`Join`]: attaches a child stream as a named relationship
//! - [`Exists`]: keeps parents by emptiness of a relationship
//! - [`Take`]: limits a stream, optionally per partition
//! - [`GroupBy`]: groups rows and maintains aggregates incrementally

mod aggregate;
mod exists;
mod filter;
mod group_by;
mod join;
mod take;

pub use aggregate::{
    Accumulator, Aggregate, AggregateFn, IncrementalAvg, IncrementalCount, IncrementalMax,
    IncrementalMin, IncrementalSum,
};
pub use exists::{Exists, ExistsType};
pub use filter::Filter;
pub use group_by::GroupBy;
pub use join::{Join, JoinArgs};
pub use take::{Take, TakeState};
