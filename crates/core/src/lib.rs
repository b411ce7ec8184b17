//! Ripple Core - Core types shared by the ripple IVM pipeline and replicator.
//!
//! This crate provides the foundational types for the ripple sync engine:
//!
//! - `DataType`: Column types (Boolean, Int64, Float64, String, Json, Enum)
//! - `Value`: Runtime values stored in a row cell, with a total order
//! - `Row`: An ordered mapping from column name to value
//! - `SortOrder`: A sequence of (column, direction) pairs defining a total order
//! - `TableSchema`: Table name, column types and primary key
//! - `pattern_match`: The LIKE / ILIKE matcher shared by every predicate path
//! - `Error`: Error types for build-time and source-contract failures
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{row, Direction, SortOrder, Value};
//!
//! let order = SortOrder::new().then("b", Direction::Asc).then("a", Direction::Asc);
//!
//! let r1 = row! { "a" => 1, "b" => "a" };
//! let r2 = row! { "a" => 2, "b" => "b" };
//!
//! assert_eq!(order.compare(&r1, &r2), core::cmp::Ordering::Less);
//! assert_eq!(r1.get("b"), &Value::from("a"));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod ordering;
pub mod pattern_match;
mod row;
mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use ordering::{Direction, OrderPart, SortOrder};
pub use row::Row;
pub use schema::TableSchema;
pub use types::DataType;
pub use value::Value;
