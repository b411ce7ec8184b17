//! Journal for undoing replica writes.
//!
//! Writes are applied to the tables eagerly; the journal remembers enough to
//! put every touched row back if the batch fails.

use crate::replica::Replica;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Error, Result, Row, Value};

/// A single journal entry representing an applied write.
#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    /// A row was inserted at `key`.
    Insert {
        table: String,
        key: Vec<Value>,
        row: Row,
    },
    /// The row at `old_key` was replaced by a row at `new_key`.
    Update {
        table: String,
        old_key: Vec<Value>,
        old: Row,
        new_key: Vec<Value>,
        new: Row,
    },
    /// The row at `key` was deleted.
    Delete {
        table: String,
        key: Vec<Value>,
        row: Row,
    },
}

impl JournalEntry {
    /// Returns the table name for this entry.
    pub fn table(&self) -> &str {
        match self {
            JournalEntry::Insert { table, .. } => table,
            JournalEntry::Update { table, .. } => table,
            JournalEntry::Delete { table, .. } => table,
        }
    }
}

/// Ordered record of the writes made by one transaction.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&mut self, table: &str, key: Vec<Value>, row: Row) {
        self.entries.push(JournalEntry::Insert {
            table: table.into(),
            key,
            row,
        });
    }

    pub fn record_update(
        &mut self,
        table: &str,
        old_key: Vec<Value>,
        old: Row,
        new_key: Vec<Value>,
        new: Row,
    ) {
        self.entries.push(JournalEntry::Update {
            table: table.into(),
            old_key,
            old,
            new_key,
            new,
        });
    }

    pub fn record_delete(&mut self, table: &str, key: Vec<Value>, row: Row) {
        self.entries.push(JournalEntry::Delete {
            table: table.into(),
            key,
            row,
        });
    }

    /// Returns all journal entries in application order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finalizes the journal, handing back its entries.
    pub fn commit(&mut self) -> Vec<JournalEntry> {
        core::mem::take(&mut self.entries)
    }

    /// Undoes every recorded write, newest first.
    pub fn rollback(&mut self, replica: &mut Replica) -> Result<()> {
        while let Some(entry) = self.entries.pop() {
            let table = entry.table();
            let store = replica
                .table_mut(table)
                .ok_or_else(|| Error::table_not_found(table))?;
            match entry {
                JournalEntry::Insert { key, .. } => {
                    store.raw_remove(&key);
                }
                JournalEntry::Update {
                    old_key,
                    old,
                    new_key,
                    ..
                } => {
                    store.raw_remove(&new_key);
                    store.raw_put(old_key, old);
                }
                JournalEntry::Delete { key, row, .. } => {
                    store.raw_put(key, row);
                }
            }
        }
        Ok(())
    }
}
