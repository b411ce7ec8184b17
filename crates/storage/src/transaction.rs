//! Transactions over a replica.
//!
//! A transaction applies statements immediately and journals each write so
//! that a failed batch can be undone.

use crate::journal::{Journal, JournalEntry};
use crate::replica::{Replica, Table};
use crate::statement::Statement;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use ripple_core::{Error, Result, Row, Value};

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A replica transaction.
pub struct Transaction {
    id: TransactionId,
    journal: Journal,
    state: TransactionState,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn begin() -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
            journal: Journal::new(),
            state: TransactionState::Active,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::invalid_operation("Transaction is not active"));
        }
        Ok(())
    }

    /// Applies one statement, returning the number of rows it wrote.
    ///
    /// A failing statement leaves the replica untouched; earlier statements
    /// of the transaction stay applied until [`rollback`](Self::rollback).
    pub fn execute(&mut self, replica: &mut Replica, stmt: &Statement) -> Result<usize> {
        self.check_active()?;

        let name = stmt.table();
        let table = replica
            .table_mut(name)
            .ok_or_else(|| Error::table_not_found(name))?;

        match stmt {
            Statement::Insert { row, .. } => {
                table.check(row, None)?;
                let key = table.key_of(row);
                table.raw_put(key.clone(), row.clone());
                self.journal.record_insert(name, key, row.clone());
                Ok(1)
            }
            Statement::Upsert { row, .. } => {
                let key = table.key_of(row);
                if table.get(&key).is_some() {
                    self.replace(table, name, &key, row)
                } else {
                    table.check(row, None)?;
                    table.raw_put(key.clone(), row.clone());
                    self.journal.record_insert(name, key, row.clone());
                    Ok(1)
                }
            }
            Statement::Update { key, row, .. } => {
                if table.get(key).is_none() {
                    return Ok(0);
                }
                self.replace(table, name, key, row)
            }
            Statement::Delete { key, .. } => Ok(self.remove(table, name, key)),
            Statement::DeleteMatching { filter, .. } => {
                let keys = table.matching_keys(filter);
                Ok(keys.iter().map(|k| self.remove(table, name, k)).sum())
            }
            Statement::Truncate { .. } => {
                let keys = table.keys();
                Ok(keys.iter().map(|k| self.remove(table, name, k)).sum())
            }
        }
    }

    fn replace(&mut self, table: &mut Table, name: &str, key: &[Value], row: &Row) -> Result<usize> {
        table.check(row, Some(key))?;
        let old = match table.raw_remove(key) {
            Some(old) => old,
            None => return Ok(0),
        };
        let new_key = table.key_of(row);
        table.raw_put(new_key.clone(), row.clone());
        self.journal
            .record_update(name, key.to_vec(), old, new_key, row.clone());
        Ok(1)
    }

    fn remove(&mut self, table: &mut Table, name: &str, key: &[Value]) -> usize {
        match table.raw_remove(key) {
            Some(row) => {
                self.journal.record_delete(name, key.to_vec(), row);
                1
            }
            None => 0,
        }
    }

    /// Commits the transaction.
    pub fn commit(mut self) -> Result<Vec<JournalEntry>> {
        self.check_active()?;
        self.state = TransactionState::Committed;
        Ok(self.journal.commit())
    }

    /// Rolls back the transaction, undoing every write it made.
    pub fn rollback(mut self, replica: &mut Replica) -> Result<()> {
        self.check_active()?;
        self.state = TransactionState::RolledBack;
        self.journal.rollback(replica)
    }

    /// Returns the writes made so far.
    pub fn changes(&self) -> &[JournalEntry] {
        self.journal.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use ripple_core::{row, DataType, TableSchema};

    fn replica() -> Replica {
        let mut replica = Replica::new();
        replica
            .create_table(
                TableSchema::new("users")
                    .column("id", DataType::Int64)
                    .column("name", DataType::String)
                    .primary_key(&["id"])
                    .unwrap(),
            )
            .unwrap();
        replica
    }

    #[test]
    fn test_transaction_ids_increase() {
        let a = Transaction::begin();
        let b = Transaction::begin();
        assert!(b.id() > a.id());
        assert_eq!(a.state(), TransactionState::Active);
    }

    #[test]
    fn test_commit_returns_journal() {
        let mut replica = replica();
        let mut tx = Transaction::begin();
        tx.execute(&mut replica, &Statement::insert("users", row! { "id" => 1, "name" => "Alice" }))
            .unwrap();
        tx.execute(
            &mut replica,
            &Statement::upsert("users", row! { "id" => 1, "name" => "Bob" }),
        )
        .unwrap();
        assert_eq!(tx.changes().len(), 2);

        let entries = tx.commit().unwrap();
        assert!(matches!(entries[0], JournalEntry::Insert { .. }));
        assert!(matches!(entries[1], JournalEntry::Update { .. }));
        assert_eq!(
            replica.rows("users").unwrap(),
            vec![row! { "id" => 1, "name" => "Bob" }]
        );
    }

    #[test]
    fn test_rollback_restores_rows() {
        let mut replica = replica();
        replica
            .execute(&[Statement::insert("users", row! { "id" => 1, "name" => "Alice" })])
            .unwrap();

        let mut tx = Transaction::begin();
        tx.execute(&mut replica, &Statement::truncate("users")).unwrap();
        tx.execute(&mut replica, &Statement::insert("users", row! { "id" => 2 }))
            .unwrap();
        assert_eq!(replica.table("users").unwrap().len(), 1);

        tx.rollback(&mut replica).unwrap();
        assert_eq!(
            replica.rows("users").unwrap(),
            vec![row! { "id" => 1, "name" => "Alice" }]
        );
    }

    #[test]
    fn test_failed_statement_writes_nothing() {
        let mut replica = replica();
        let mut tx = Transaction::begin();
        let err = tx
            .execute(&mut replica, &Statement::insert("users", row! { "id" => "x" }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
        assert!(tx.changes().is_empty());
        assert!(replica.table("users").unwrap().is_empty());
    }

    #[test]
    fn test_null_key_rejected() {
        let mut replica = replica();
        let mut tx = Transaction::begin();
        assert!(tx
            .execute(&mut replica, &Statement::insert("users", row! { "name" => "anon" }))
            .is_err());
    }
}
