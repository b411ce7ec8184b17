//! Ripple Storage - the in-memory replica written by the replicator.
//!
//! This crate provides:
//!
//! - `Replica`: replicated tables plus the `TxLog` / `ChangeLog` bookkeeping tables
//! - `Statement`: the writes a replica accepts
//! - `Transaction`: atomic batches with journal rollback
//! - `ConstraintChecker`: primary key and unique constraint validation
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{row, DataType, Error, TableSchema};
//! use ripple_storage::{Replica, Statement};
//!
//! let mut replica = Replica::new();
//! replica
//!     .create_table(
//!         TableSchema::new("users")
//!             .column("id", DataType::Int64)
//!             .column("name", DataType::String)
//!             .primary_key(&["id"])
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! // A failing batch leaves nothing behind.
//! let err = replica
//!     .execute(&[
//!         Statement::insert("users", row! { "id" => 1, "name" => "Alice" }),
//!         Statement::insert("users", row! { "id" => 1, "name" => "Bob" }),
//!     ])
//!     .unwrap_err();
//! assert_eq!(err, Error::unique_violation("users", "users_pkey"));
//! assert!(replica.table("users").unwrap().is_empty());
//! ```

#![no_std]

extern crate alloc;

pub mod constraint;
pub mod journal;
pub mod replica;
pub mod statement;
pub mod transaction;

pub use constraint::{ConstraintChecker, UniqueConstraint};
pub use journal::{Journal, JournalEntry};
pub use replica::{
    change_log_schema, tx_log_schema, Replica, Table, CHANGE_LOG, TX_LOG, VERSION_COLUMN,
};
pub use statement::Statement;
pub use transaction::{Transaction, TransactionId, TransactionState};
