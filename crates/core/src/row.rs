//! Row structure for ripple.
//!
//! This module defines the `Row` struct which represents a single row in a table.
//! Rows are keyed by column name; a column that is absent reads as `Null`.

use crate::value::Value;
use alloc::collections::btree_map::{self, BTreeMap};
use alloc::string::String;
use alloc::vec::Vec;

static NULL: Value = Value::Null;

/// A row in a table: an ordered mapping from column name to value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `column`, or `Null` if the column is absent.
    #[inline]
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    /// Returns the value of `column` if the column is present.
    #[inline]
    pub fn get_opt(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Returns true if the row carries `column`.
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Sets a column value, returning the previous one.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(column.into(), value.into())
    }

    /// Builder-style `set`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Removes a column.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Returns the number of columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(column, value)` pairs in column-name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }

    /// Returns the column names in column-name order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Projects the given columns in order.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Vec<Value> {
        columns.iter().map(|c| self.get(c.as_ref()).clone()).collect()
    }

    /// Returns a row holding only the given columns.
    pub fn pick<S: AsRef<str>>(&self, columns: &[S]) -> Row {
        let mut out = Row::new();
        for c in columns {
            out.set(c.as_ref(), self.get(c.as_ref()).clone());
        }
        out
    }

    /// Returns true if every given column is equal in `self` and `other`.
    pub fn same_values<S: AsRef<str>>(&self, other: &Row, columns: &[S]) -> bool {
        columns
            .iter()
            .all(|c| self.get(c.as_ref()) == other.get(c.as_ref()))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Builds a [`Row`] from `column => value` pairs.
///
/// ```rust
/// use ripple_core::row;
/// let r = row! { "id" => 1, "title" => "hello" };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($col:expr => $val:expr),+ $(,)?) => {
        $crate::Row::new()$(.with($col, $val))+
    };
}
