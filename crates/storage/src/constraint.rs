//! Unique constraint checking for replica tables.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Error, Result, Row, Value};

/// A unique constraint over one or more columns.
///
/// Rows with a null in any constrained column never conflict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    pub fn new<S: AsRef<str>>(name: impl Into<String>, columns: &[S]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| String::from(c.as_ref())).collect(),
        }
    }

    /// The name Postgres gives a table's primary key constraint.
    pub fn primary_key_name(table: &str) -> String {
        // Schema-qualified names keep only the relation part.
        let relation = table.rsplit('.').next().unwrap_or(table);
        format!("{}_pkey", relation)
    }

    fn conflicts(&self, a: &Row, b: &Row) -> bool {
        self.columns.iter().all(|c| {
            let v = a.get(c);
            !v.is_null() && v == b.get(c)
        })
    }
}

/// Constraint checker for replica writes.
pub struct ConstraintChecker;

impl ConstraintChecker {
    /// Checks `row` against `constraints` over the rows already stored.
    ///
    /// The row stored at `replacing`, if any, is the one being overwritten
    /// and is skipped.
    pub fn check_unique(
        table: &str,
        constraints: &[UniqueConstraint],
        rows: &BTreeMap<Vec<Value>, Row>,
        row: &Row,
        replacing: Option<&[Value]>,
    ) -> Result<()> {
        for constraint in constraints {
            let clash = rows
                .iter()
                .filter(|(key, _)| Some(key.as_slice()) != replacing)
                .any(|(_, existing)| constraint.conflicts(existing, row));
            if clash {
                return Err(Error::unique_violation(table, constraint.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use ripple_core::row;

    fn stored() -> BTreeMap<Vec<Value>, Row> {
        let mut rows = BTreeMap::new();
        rows.insert(
            vec![Value::from(1)],
            row! { "id" => 1, "email" => "a@x" },
        );
        rows.insert(vec![Value::from(2)], row! { "id" => 2 });
        rows
    }

    #[test]
    fn test_primary_key_name() {
        assert_eq!(UniqueConstraint::primary_key_name("issues"), "issues_pkey");
        assert_eq!(
            UniqueConstraint::primary_key_name("_ripple.TxLog"),
            "TxLog_pkey"
        );
    }

    #[test]
    fn test_unique_violation() {
        let constraints = vec![UniqueConstraint::new("users_email_key", &["email"])];
        let err = ConstraintChecker::check_unique(
            "users",
            &constraints,
            &stored(),
            &row! { "id" => 3, "email" => "a@x" },
            None,
        )
        .unwrap_err();
        assert_eq!(err, Error::unique_violation("users", "users_email_key"));
    }

    #[test]
    fn test_replacing_row_and_nulls_do_not_conflict() {
        let constraints = vec![UniqueConstraint::new("users_email_key", &["email"])];
        let rows = stored();
        let key = vec![Value::from(1)];
        assert!(ConstraintChecker::check_unique(
            "users",
            &constraints,
            &rows,
            &row! { "id" => 1, "email" => "a@x" },
            Some(&key),
        )
        .is_ok());
        assert!(ConstraintChecker::check_unique(
            "users",
            &constraints,
            &rows,
            &row! { "id" => 4 },
            None,
        )
        .is_ok());
    }
}
