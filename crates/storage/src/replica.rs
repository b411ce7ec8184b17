//! The replica: the downstream copy of replicated tables plus the
//! bookkeeping tables the replicator writes alongside them.

use crate::constraint::{ConstraintChecker, UniqueConstraint};
use crate::statement::Statement;
use crate::transaction::Transaction;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{DataType, Error, Result, Row, TableSchema, Value};

/// Bookkeeping table holding one row per applied transaction.
pub const TX_LOG: &str = "_ripple.TxLog";
/// Bookkeeping table holding one row per changed row key per transaction.
pub const CHANGE_LOG: &str = "_ripple.ChangeLog";
/// Column stamped on every replicated row with the writing state version.
pub const VERSION_COLUMN: &str = "_0_version";

/// Schema of [`TX_LOG`]: keyed by state version.
pub fn tx_log_schema() -> TableSchema {
    TableSchema::new(TX_LOG)
        .column("stateVersion", DataType::String)
        .column("lsn", DataType::String)
        .column("time", DataType::Int64)
        .column("xid", DataType::Int64)
        .primary_key(&["stateVersion"])
        .unwrap_or_else(|_| unreachable!("key column is declared"))
}

/// Schema of [`CHANGE_LOG`]: keyed by state version, table and row key hash.
pub fn change_log_schema() -> TableSchema {
    TableSchema::new(CHANGE_LOG)
        .column("stateVersion", DataType::String)
        .column("schema", DataType::String)
        .column("table", DataType::String)
        .column("rowKeyHash", DataType::String)
        .column("op", DataType::String)
        .column("rowKey", DataType::Json)
        .column("row", DataType::Json)
        .primary_key(&["stateVersion", "table", "rowKeyHash"])
        .unwrap_or_else(|_| unreachable!("key columns are declared"))
}

/// One replica table: rows keyed by primary key values.
#[derive(Clone, Debug)]
pub struct Table {
    schema: TableSchema,
    unique: Vec<UniqueConstraint>,
    rows: BTreeMap<Vec<Value>, Row>,
}

impl Table {
    fn new(schema: TableSchema) -> Self {
        let pkey = UniqueConstraint::new(
            UniqueConstraint::primary_key_name(schema.name()),
            schema.primary_key_columns(),
        );
        Self {
            schema,
            unique: alloc::vec![pkey],
            rows: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Unique constraints, the primary key first.
    pub fn constraints(&self) -> &[UniqueConstraint] {
        &self.unique
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row stored at `key`.
    pub fn get(&self, key: &[Value]) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Iterates rows in primary key order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub(crate) fn key_of(&self, row: &Row) -> Vec<Value> {
        self.schema.key_of(row)
    }

    /// Keys of rows whose cells equal every cell of `filter`.
    pub(crate) fn matching_keys(&self, filter: &Row) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .filter(|(_, row)| filter.iter().all(|(c, v)| row.get(c) == v))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<Value>> {
        self.rows.keys().cloned().collect()
    }

    /// Validates `row` and checks it against every unique constraint,
    /// ignoring the row at `replacing`.
    pub(crate) fn check(&self, row: &Row, replacing: Option<&[Value]>) -> Result<()> {
        self.schema.validate_row(row)?;
        for c in self.schema.primary_key_columns() {
            if row.get(c).is_null() {
                return Err(Error::invalid_operation(alloc::format!(
                    "null value in key column {}.{}",
                    self.schema.name(),
                    c
                )));
            }
        }
        ConstraintChecker::check_unique(
            self.schema.name(),
            &self.unique,
            &self.rows,
            row,
            replacing,
        )
    }

    pub(crate) fn raw_put(&mut self, key: Vec<Value>, row: Row) {
        self.rows.insert(key, row);
    }

    pub(crate) fn raw_remove(&mut self, key: &[Value]) -> Option<Row> {
        self.rows.remove(key)
    }
}

/// An in-memory replica database.
#[derive(Clone, Debug, Default)]
pub struct Replica {
    tables: BTreeMap<String, Table>,
}

impl Replica {
    /// Creates a replica with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a replica holding the [`TX_LOG`] and [`CHANGE_LOG`] tables.
    pub fn with_replication_tables() -> Self {
        let mut replica = Self::new();
        replica.tables.insert(TX_LOG.into(), Table::new(tx_log_schema()));
        replica
            .tables
            .insert(CHANGE_LOG.into(), Table::new(change_log_schema()));
        replica
    }

    /// Creates a table. Fails if the name is taken or the table has no key.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        if self.tables.contains_key(schema.name()) {
            return Err(Error::invalid_schema(alloc::format!(
                "table {} already exists",
                schema.name()
            )));
        }
        if schema.primary_key_columns().is_empty() {
            return Err(Error::invalid_schema(alloc::format!(
                "table {} has no primary key",
                schema.name()
            )));
        }
        self.tables
            .insert(schema.name().into(), Table::new(schema));
        Ok(())
    }

    /// Adds a unique constraint to an existing, empty-or-consistent table.
    pub fn add_unique_constraint<S: AsRef<str>>(
        &mut self,
        table: &str,
        name: &str,
        columns: &[S],
    ) -> Result<()> {
        let store = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::table_not_found(table))?;
        for c in columns {
            if !store.schema.has_column(c.as_ref()) {
                return Err(Error::column_not_found(table, c.as_ref()));
            }
        }
        store.unique.push(UniqueConstraint::new(name, columns));
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Returns a copy of every row of `table`, in primary key order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        self.tables
            .get(table)
            .map(|t| t.rows().cloned().collect())
            .ok_or_else(|| Error::table_not_found(table))
    }

    /// Applies `statements` atomically.
    ///
    /// Either every statement takes effect or, on the first failure, every
    /// earlier write of the batch is undone and the error is returned.
    /// Returns the number of rows written.
    pub fn execute(&mut self, statements: &[Statement]) -> Result<usize> {
        let mut tx = Transaction::begin();
        let mut affected = 0;
        for stmt in statements {
            match tx.execute(self, stmt) {
                Ok(n) => affected += n,
                Err(e) => {
                    tx.rollback(self)?;
                    return Err(e);
                }
            }
        }
        tx.commit()?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use ripple_core::row;

    fn replica() -> Replica {
        let mut replica = Replica::with_replication_tables();
        replica
            .create_table(
                TableSchema::new("issues")
                    .column("id", DataType::Int64)
                    .column("title", DataType::String)
                    .column(VERSION_COLUMN, DataType::String)
                    .primary_key(&["id"])
                    .unwrap(),
            )
            .unwrap();
        replica
    }

    fn titles(replica: &Replica) -> Vec<Value> {
        replica
            .rows("issues")
            .unwrap()
            .into_iter()
            .map(|r| r.get("title").clone())
            .collect()
    }

    #[test]
    fn test_replication_tables() {
        let replica = replica();
        assert_eq!(
            replica.table_names(),
            vec![CHANGE_LOG, TX_LOG, "issues"]
        );
        assert_eq!(
            replica.table(CHANGE_LOG).unwrap().schema().primary_key_columns(),
            &["stateVersion", "table", "rowKeyHash"]
        );
    }

    #[test]
    fn test_create_table_errors() {
        let mut replica = replica();
        let dup = TableSchema::new("issues")
            .column("id", DataType::Int64)
            .primary_key(&["id"])
            .unwrap();
        assert!(matches!(
            replica.create_table(dup),
            Err(Error::InvalidSchema { .. })
        ));
        let keyless = TableSchema::new("notes").column("id", DataType::Int64);
        assert!(matches!(
            replica.create_table(keyless),
            Err(Error::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_insert_duplicate_key_is_pkey_violation() {
        let mut replica = replica();
        replica
            .execute(&[Statement::insert("issues", row! { "id" => 1, "title" => "a" })])
            .unwrap();
        let err = replica
            .execute(&[Statement::insert("issues", row! { "id" => 1, "title" => "b" })])
            .unwrap_err();
        assert_eq!(err, Error::unique_violation("issues", "issues_pkey"));
        assert_eq!(titles(&replica), vec![Value::from("a")]);
    }

    #[test]
    fn test_upsert_update_delete() {
        let mut replica = replica();
        let n = replica
            .execute(&[
                Statement::upsert("issues", row! { "id" => 1, "title" => "a" }),
                Statement::upsert("issues", row! { "id" => 1, "title" => "b" }),
                Statement::insert("issues", row! { "id" => 2, "title" => "c" }),
                Statement::update(
                    "issues",
                    vec![Value::from(2)],
                    row! { "id" => 3, "title" => "d" },
                ),
                Statement::delete("issues", vec![Value::from(9)]),
                Statement::update(
                    "issues",
                    vec![Value::from(9)],
                    row! { "id" => 9, "title" => "x" },
                ),
            ])
            .unwrap();
        assert_eq!(n, 4);
        let rows = replica.rows("issues").unwrap();
        assert_eq!(
            rows,
            vec![
                row! { "id" => 1, "title" => "b" },
                row! { "id" => 3, "title" => "d" },
            ]
        );
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let mut replica = replica();
        replica
            .execute(&[
                Statement::insert("issues", row! { "id" => 1, "title" => "a" }),
                Statement::insert("issues", row! { "id" => 2, "title" => "b" }),
            ])
            .unwrap();

        let err = replica
            .execute(&[
                Statement::update(
                    "issues",
                    vec![Value::from(1)],
                    row! { "id" => 5, "title" => "moved" },
                ),
                Statement::delete("issues", vec![Value::from(2)]),
                Statement::truncate("issues"),
                Statement::insert("issues", row! { "id" => 7, "title" => "x" }),
                Statement::insert("issues", row! { "id" => 7, "title" => "y" }),
            ])
            .unwrap_err();
        assert_eq!(err, Error::unique_violation("issues", "issues_pkey"));
        assert_eq!(
            replica.rows("issues").unwrap(),
            vec![
                row! { "id" => 1, "title" => "a" },
                row! { "id" => 2, "title" => "b" },
            ]
        );
    }

    #[test]
    fn test_update_onto_existing_key_fails() {
        let mut replica = replica();
        replica
            .execute(&[
                Statement::insert("issues", row! { "id" => 1 }),
                Statement::insert("issues", row! { "id" => 2 }),
            ])
            .unwrap();
        let err = replica
            .execute(&[Statement::update(
                "issues",
                vec![Value::from(1)],
                row! { "id" => 2 },
            )])
            .unwrap_err();
        assert_eq!(err, Error::unique_violation("issues", "issues_pkey"));
    }

    #[test]
    fn test_delete_matching() {
        let mut replica = replica();
        let log = |v: &str, t: &str, h: &str| {
            Statement::insert(
                CHANGE_LOG,
                row! { "stateVersion" => v, "table" => t, "rowKeyHash" => h, "op" => "s" },
            )
        };
        replica
            .execute(&[
                log("01", "issues", "a"),
                log("01", "issues", "b"),
                log("01", "users", "a"),
                log("02", "issues", "a"),
            ])
            .unwrap();
        let n = replica
            .execute(&[Statement::delete_matching(
                CHANGE_LOG,
                row! { "stateVersion" => "01", "table" => "issues" },
            )])
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(replica.table(CHANGE_LOG).unwrap().len(), 2);
    }

    #[test]
    fn test_extra_unique_constraint() {
        let mut replica = replica();
        replica
            .add_unique_constraint("issues", "issues_title_key", &["title"])
            .unwrap();
        assert!(matches!(
            replica.add_unique_constraint("issues", "bad", &["nope"]),
            Err(Error::ColumnNotFound { .. })
        ));
        let err = replica
            .execute(&[
                Statement::insert("issues", row! { "id" => 1, "title" => "same" }),
                Statement::insert("issues", row! { "id" => 2, "title" => "same" }),
            ])
            .unwrap_err();
        assert_eq!(err, Error::unique_violation("issues", "issues_title_key"));
        assert!(replica.table("issues").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_table_and_column() {
        let mut replica = replica();
        assert_eq!(
            replica.execute(&[Statement::truncate("nope")]).unwrap_err(),
            Error::table_not_found("nope")
        );
        assert!(matches!(
            replica.execute(&[Statement::insert("issues", row! { "id" => 1, "extra" => 2 })]),
            Err(Error::ColumnNotFound { .. })
        ));
    }
}
