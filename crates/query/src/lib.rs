//! Ripple Query - query AST and pipeline builder.
//!
//! This crate turns declarative queries into incremental operator graphs:
//!
//! - `ast`: query, condition and correlated subquery definitions
//! - `predicate`: compiles conditions into row predicates
//! - `context`: the `BuilderContext` that supplies sources and storage
//! - `builder`: wires sources and operators for an AST
//!
//! # Example
//!
//! ```
//! use ripple_core::{row, DataType, SortOrder, TableSchema};
//! use ripple_incremental::{FetchRequest, Input, MemorySource, SourceChange};
//! use ripple_query::ast::{Ast, Comparison, Condition};
//! use ripple_query::{build_pipeline, MemoryContext};
//!
//! let issue = MemorySource::new(
//!     TableSchema::new("issue")
//!         .column("id", DataType::Int64)
//!         .column("open", DataType::Boolean)
//!         .primary_key(&["id"])
//!         .unwrap(),
//! );
//! issue.push(SourceChange::Add(row! { "id" => 1, "open" => true })).unwrap();
//! issue.push(SourceChange::Add(row! { "id" => 2, "open" => false })).unwrap();
//!
//! let ctx = MemoryContext::new().with_source(issue);
//! let ast = Ast::new("issue")
//!     .order_by(SortOrder::ascending(&["id"]))
//!     .filter(Condition::simple(Comparison::Eq, "open", true));
//! let pipeline = build_pipeline(&ast, &ctx).unwrap();
//! assert_eq!(pipeline.fetch(&FetchRequest::all()).len(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod ast;
pub mod builder;
pub mod context;
pub mod predicate;

pub use builder::{build_pipeline, EXISTS_LIMIT};
pub use context::{BuilderContext, MemoryContext};
