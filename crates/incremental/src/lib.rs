//! Ripple Incremental - incremental view maintenance operators.
//!
//! Queries compile to a graph of operators rooted at [`MemorySource`]s. The
//! graph is read by pulling (`fetch` / `hydrate` / `cleanup`) and kept up to
//! date by pushing [`Change`]s from the sources through every operator.
//!
//! # Core Concepts
//!
//! - [`Node`]: a row plus named child relationships, the unit of output
//! - [`Change`]: add / remove / edit of a node, or a change nested under a
//!   parent's relationship
//! - [`Input`] / [`Output`]: the pull and push halves of every operator
//! - [`Storage`]: per-operator side table (join reference counts, exists
//!   sizes, take windows)
//!
//! # Operators
//!
//! - [`Filter`], [`Join`], [`Exists`], [`Take`], [`GroupBy`]
//!
//! # Example
//!
//! ```
//! use ripple_core::{row, DataType, SortOrder, TableSchema};
//! use ripple_incremental::{FetchRequest, Input, MemorySource, SourceChange};
//!
//! let table = TableSchema::new("issue")
//!     .column("id", DataType::Int64)
//!     .primary_key(&["id"])
//!     .unwrap();
//! let source = MemorySource::new(table);
//! source.push(SourceChange::Add(row! { "id" => 2 })).unwrap();
//! source.push(SourceChange::Add(row! { "id" => 1 })).unwrap();
//!
//! let conn = source.connect(SortOrder::ascending(&["id"]), None).unwrap();
//! let nodes = conn.fetch(&FetchRequest::all());
//! assert_eq!(nodes[0].row.get("id").as_i64(), Some(1));
//! ```

#![no_std]

extern crate alloc;

pub mod change;
pub mod node;
pub mod operator;
pub mod operators;
pub mod source;
pub mod storage;
pub mod testing;

pub use change::{Change, ChildChange, SourceChange};
pub use node::Node;
pub use operator::{
    output_to, Constraint, FetchMode, FetchRequest, Input, Output, OutputSlot, RowPredicate,
    SourceSchema, Start, StartBasis,
};
pub use operators::{
    Aggregate, AggregateFn, Exists, ExistsType, Filter, GroupBy, Join, JoinArgs, Take, TakeState,
};
pub use source::{MemorySource, SourceInput};
pub use storage::{Storage, StorageKey};
