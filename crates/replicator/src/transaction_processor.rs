//! Assembles one upstream transaction into a replica batch.
//!
//! The batch starts with the TxLog insert, so replaying a transaction that
//! was already applied fails on the TxLog primary key before anything else
//! is written. Every row change writes the replica table and upserts the
//! ChangeLog entry for `(stateVersion, table, rowKeyHash)`; later changes
//! to the same row in the transaction overwrite earlier entries.

use crate::error::{ReplicatorError, Result};
use crate::lexi_version::to_lexi_version;
use crate::message::Relation;
use crate::row_key::{row_key, row_key_hash, row_to_json};
use ripple_core::{row, Row, Value};
use ripple_storage::{Statement, CHANGE_LOG, TX_LOG, VERSION_COLUMN};
use serde_json::Value as JsonValue;

/// ChangeLog op for inserts and updates.
pub const OP_SET: &str = "s";
/// ChangeLog op for deletes.
pub const OP_DELETE: &str = "d";
/// ChangeLog op for truncates.
pub const OP_TRUNCATE: &str = "t";

/// Statements accumulated for one upstream transaction.
#[derive(Debug)]
pub struct TransactionProcessor {
    commit_lsn: String,
    state_version: String,
    xid: u32,
    statements: Vec<Statement>,
    failure: Option<ReplicatorError>,
}

impl TransactionProcessor {
    /// Starts a transaction committed at `commit_lsn`.
    pub fn begin(commit_lsn: &str, commit_time: i64, xid: u32) -> Result<Self> {
        let state_version = to_lexi_version(commit_lsn)?;
        let tx_log = row! {
            "stateVersion" => state_version.as_str(),
            "lsn" => commit_lsn,
            "time" => commit_time,
            "xid" => i64::from(xid),
        };
        Ok(Self {
            commit_lsn: commit_lsn.to_string(),
            state_version,
            xid,
            statements: vec![Statement::insert(TX_LOG, tx_log)],
            failure: None,
        })
    }

    pub fn commit_lsn(&self) -> &str {
        &self.commit_lsn
    }

    pub fn state_version(&self) -> &str {
        &self.state_version
    }

    pub fn xid(&self) -> u32 {
        self.xid
    }

    /// Statements assembled so far, TxLog insert first.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Records an assembly failure. It is raised when the transaction is
    /// processed, after every earlier transaction has finished.
    pub fn fail(&mut self, err: ReplicatorError) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn process_insert(&mut self, relation: &Relation, new: Row) -> Result<()> {
        let row = self.stamp(new);
        let key = row_key(&row, &relation.key_columns);
        self.log_set(relation, &key, &row)?;
        self.statements
            .push(Statement::insert(relation.table_name(), row));
        Ok(())
    }

    /// `old_key` is present only when the update changed the row's key.
    pub fn process_update(
        &mut self,
        relation: &Relation,
        old_key: Option<Row>,
        new: Row,
    ) -> Result<()> {
        let row = self.stamp(new);
        let new_key = row_key(&row, &relation.key_columns);
        let old_key = old_key.as_ref().unwrap_or(&row);
        let old_key_json = row_key(old_key, &relation.key_columns);

        if old_key_json != new_key {
            self.log_delete(relation, &old_key_json)?;
        }
        self.log_set(relation, &new_key, &row)?;
        self.statements.push(Statement::update(
            relation.table_name(),
            old_key.project(&relation.key_columns),
            row,
        ));
        Ok(())
    }

    pub fn process_delete(&mut self, relation: &Relation, key: Row) -> Result<()> {
        let key_json = row_key(&key, &relation.key_columns);
        self.log_delete(relation, &key_json)?;
        self.statements.push(Statement::delete(
            relation.table_name(),
            key.project(&relation.key_columns),
        ));
        Ok(())
    }

    pub fn process_truncate(&mut self, relations: &[Relation]) -> Result<()> {
        for relation in relations {
            let table = relation.table_name();
            // Earlier entries for the table in this transaction are superseded.
            self.statements.push(Statement::delete_matching(
                CHANGE_LOG,
                row! {
                    "stateVersion" => self.state_version.as_str(),
                    "table" => table.as_str(),
                },
            ));
            self.statements.push(Statement::upsert(
                CHANGE_LOG,
                self.change_log_row(relation, "", OP_TRUNCATE, &JsonValue::Object(Default::default()), None)?,
            ));
            self.statements.push(Statement::truncate(table));
        }
        Ok(())
    }

    /// Finishes assembly, returning the batch or the deferred failure.
    pub fn into_batch(self) -> Result<Vec<Statement>> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.statements),
        }
    }

    fn stamp(&self, mut row: Row) -> Row {
        row.set(VERSION_COLUMN, self.state_version.as_str());
        row
    }

    fn log_set(&mut self, relation: &Relation, key: &JsonValue, row: &Row) -> Result<()> {
        let entry = self.change_log_row(relation, &row_key_hash(key), OP_SET, key, Some(row))?;
        self.statements.push(Statement::upsert(CHANGE_LOG, entry));
        Ok(())
    }

    fn log_delete(&mut self, relation: &Relation, key: &JsonValue) -> Result<()> {
        let entry = self.change_log_row(relation, &row_key_hash(key), OP_DELETE, key, None)?;
        self.statements.push(Statement::upsert(CHANGE_LOG, entry));
        Ok(())
    }

    fn change_log_row(
        &self,
        relation: &Relation,
        hash: &str,
        op: &str,
        key: &JsonValue,
        row: Option<&Row>,
    ) -> Result<Row> {
        let row = match row {
            Some(row) => Value::Json(serde_json::to_string(&row_to_json(row))?),
            None => Value::Null,
        };
        Ok(row! {
            "stateVersion" => self.state_version.as_str(),
            "schema" => relation.schema.as_str(),
            "table" => relation.table_name(),
            "rowKeyHash" => hash,
            "op" => op,
            "rowKey" => Value::Json(serde_json::to_string(key)?),
            "row" => row,
        })
    }
}
