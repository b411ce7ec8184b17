//! Write statements accepted by the replica.

use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Row, Value};

/// One write against a replica table.
///
/// Keys are primary key values in the order the table declares its key
/// columns. Statements that address a missing row (`Update`, `Delete`) are
/// no-ops, matching SQL semantics.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Inserts a row; fails with a unique violation if the key exists.
    Insert { table: String, row: Row },
    /// Inserts a row, replacing any row with the same key.
    Upsert { table: String, row: Row },
    /// Replaces the row at `key` with `row`. The new row may carry a
    /// different key.
    Update {
        table: String,
        key: Vec<Value>,
        row: Row,
    },
    /// Deletes the row at `key`.
    Delete { table: String, key: Vec<Value> },
    /// Deletes every row whose columns equal all cells of `filter`.
    DeleteMatching { table: String, filter: Row },
    /// Deletes every row of the table.
    Truncate { table: String },
}

impl Statement {
    /// Returns the table this statement writes to.
    pub fn table(&self) -> &str {
        match self {
            Statement::Insert { table, .. }
            | Statement::Upsert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. }
            | Statement::DeleteMatching { table, .. }
            | Statement::Truncate { table } => table,
        }
    }

    pub fn insert(table: impl Into<String>, row: Row) -> Self {
        Statement::Insert {
            table: table.into(),
            row,
        }
    }

    pub fn upsert(table: impl Into<String>, row: Row) -> Self {
        Statement::Upsert {
            table: table.into(),
            row,
        }
    }

    pub fn update(table: impl Into<String>, key: Vec<Value>, row: Row) -> Self {
        Statement::Update {
            table: table.into(),
            key,
            row,
        }
    }

    pub fn delete(table: impl Into<String>, key: Vec<Value>) -> Self {
        Statement::Delete {
            table: table.into(),
            key,
        }
    }

    pub fn delete_matching(table: impl Into<String>, filter: Row) -> Self {
        Statement::DeleteMatching {
            table: table.into(),
            filter,
        }
    }

    pub fn truncate(table: impl Into<String>) -> Self {
        Statement::Truncate {
            table: table.into(),
        }
    }
}
