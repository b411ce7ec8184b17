//! Table schema definition.

use crate::error::{Error, Result};
use crate::ordering::SortOrder;
use crate::row::Row;
use crate::types::DataType;
use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Table name, column types and primary key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: BTreeMap<String, DataType>,
    primary_key: Vec<String>,
}

impl TableSchema {
    /// Creates a schema with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            primary_key: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.insert(name.into(), data_type);
        self
    }

    /// Sets the primary key and validates the schema.
    pub fn primary_key<S: AsRef<str>>(mut self, columns: &[S]) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_schema(alloc::format!(
                "table {} needs a primary key",
                self.name
            )));
        }
        for c in columns {
            if !self.columns.contains_key(c.as_ref()) {
                return Err(Error::column_not_found(&self.name, c.as_ref()));
            }
        }
        self.primary_key = columns.iter().map(|c| c.as_ref().to_string()).collect();
        Ok(self)
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column types.
    pub fn columns(&self) -> &BTreeMap<String, DataType> {
        &self.columns
    }

    /// Returns the type of `column`.
    pub fn column_type(&self, column: &str) -> Option<DataType> {
        self.columns.get(column).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Returns the primary key columns.
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    /// Ascending order over the primary key.
    pub fn primary_key_order(&self) -> SortOrder {
        SortOrder::ascending(&self.primary_key)
    }

    /// Extracts the primary key values of `row`.
    pub fn key_of(&self, row: &Row) -> Vec<Value> {
        row.project(&self.primary_key)
    }

    /// Renders the primary key of `row` for error messages.
    pub fn describe_key(&self, row: &Row) -> String {
        let mut out = String::new();
        for (i, c) in self.primary_key.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(c);
            out.push('=');
            out.push_str(&row.get(c).to_string());
        }
        out
    }

    /// Checks that every column of `order` exists in this table.
    pub fn validate_order(&self, order: &SortOrder) -> Result<()> {
        for c in order.columns() {
            if !self.has_column(c) {
                return Err(Error::column_not_found(&self.name, c));
            }
        }
        Ok(())
    }

    /// Checks that every cell of `row` names a known column of a compatible type.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        for (c, v) in row {
            match self.columns.get(c) {
                None => return Err(Error::column_not_found(&self.name, c.as_str())),
                Some(dt) if !dt.accepts(v) => {
                    return Err(Error::invalid_operation(alloc::format!(
                        "value {} does not fit column {}.{} ({:?})",
                        v,
                        self.name,
                        c,
                        dt
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::Direction;

    fn issue() -> TableSchema {
        TableSchema::new("issue")
            .column("id", DataType::String)
            .column("title", DataType::String)
            .column("created", DataType::Int64)
            .primary_key(&["id"])
            .unwrap()
    }

    #[test]
    fn test_primary_key_must_exist() {
        let err = TableSchema::new("t")
            .column("a", DataType::Int64)
            .primary_key(&["b"])
            .unwrap_err();
        assert_eq!(err, Error::column_not_found("t", "b"));
        assert!(TableSchema::new("t").primary_key::<&str>(&[]).is_err());
    }

    #[test]
    fn test_key_of() {
        let s = issue();
        let r = row! { "id" => "i1", "title" => "t" };
        assert_eq!(s.key_of(&r), alloc::vec![Value::from("i1")]);
        assert_eq!(s.describe_key(&r), "id=\"i1\"");
    }

    #[test]
    fn test_validate_order() {
        let s = issue();
        assert!(s
            .validate_order(&SortOrder::new().then("created", Direction::Desc))
            .is_ok());
        assert!(s.validate_order(&SortOrder::ascending(&["nope"])).is_err());
    }

    #[test]
    fn test_validate_row() {
        let s = issue();
        assert!(s.validate_row(&row! { "id" => "a", "created" => 1 }).is_ok());
        assert!(s.validate_row(&row! { "id" => "a", "created" => "x" }).is_err());
        assert!(s.validate_row(&row! { "id" => "a", "other" => 1 }).is_err());
    }
}
