//! Filter conditions.

use super::query::CorrelatedSubquery;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use ripple_core::Value;
use ripple_incremental::ExistsType;

/// The comparison a simple condition performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Comparison {
    // Ordering
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Membership / pattern
    In,
    Like,
    ILike,
    // Set
    Intersects,
    Disjoint,
    Superset,
    Subset,
    Congruent,
    Incongruent,
}

impl Comparison {
    fn keyword(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::In => "IN",
            Comparison::Like => "LIKE",
            Comparison::ILike => "ILIKE",
            Comparison::Intersects => "INTERSECTS",
            Comparison::Disjoint => "DISJOINT",
            Comparison::Superset => "SUPERSET",
            Comparison::Subset => "SUBSET",
            Comparison::Congruent => "CONGRUENT",
            Comparison::Incongruent => "INCONGRUENT",
        }
    }

    fn from_keyword(s: &str) -> Option<Self> {
        let cmp = match s {
            "=" => Comparison::Eq,
            "!=" => Comparison::Ne,
            "<" => Comparison::Lt,
            "<=" => Comparison::Le,
            ">" => Comparison::Gt,
            ">=" => Comparison::Ge,
            "IN" => Comparison::In,
            "LIKE" => Comparison::Like,
            "ILIKE" => Comparison::ILike,
            "INTERSECTS" => Comparison::Intersects,
            "DISJOINT" => Comparison::Disjoint,
            "SUPERSET" => Comparison::Superset,
            "SUBSET" => Comparison::Subset,
            "CONGRUENT" => Comparison::Congruent,
            "INCONGRUENT" => Comparison::Incongruent,
            _ => return None,
        };
        Some(cmp)
    }

    /// Returns true for the operators that treat both sides as sets.
    pub fn is_set_op(self) -> bool {
        matches!(
            self,
            Comparison::Intersects
                | Comparison::Disjoint
                | Comparison::Superset
                | Comparison::Subset
                | Comparison::Congruent
                | Comparison::Incongruent
        )
    }
}

/// A comparison, optionally wrapped in `NOT`.
///
/// `NOT` is applied to the comparison's result; it never selects a
/// different comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimpleOperator {
    pub comparison: Comparison,
    pub negated: bool,
}

impl SimpleOperator {
    pub const fn new(comparison: Comparison) -> Self {
        Self {
            comparison,
            negated: false,
        }
    }

    pub const fn not(comparison: Comparison) -> Self {
        Self {
            comparison,
            negated: true,
        }
    }

    /// Parses `"IN"`, `"NOT LIKE"`, `"SUPERSET"` and so on.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.strip_prefix("NOT ") {
            Some(rest) => Comparison::from_keyword(rest.trim()).map(Self::not),
            None => Comparison::from_keyword(s).map(Self::new),
        }
    }
}

impl From<Comparison> for SimpleOperator {
    fn from(comparison: Comparison) -> Self {
        Self::new(comparison)
    }
}

impl fmt::Display for SimpleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "NOT {}", self.comparison.keyword())
        } else {
            f.write_str(self.comparison.keyword())
        }
    }
}

/// `AND` / `OR`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

/// A `where` condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// `field op value`.
    Simple {
        op: SimpleOperator,
        field: String,
        value: Value,
    },
    Conjunction {
        op: LogicalOp,
        conditions: Vec<Condition>,
    },
    /// `EXISTS` / `NOT EXISTS` over a correlated subquery.
    Exists {
        op: ExistsType,
        subquery: Box<CorrelatedSubquery>,
    },
}

impl Condition {
    pub fn simple(op: impl Into<SimpleOperator>, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Simple {
            op: op.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::Conjunction {
            op: LogicalOp::And,
            conditions,
        }
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Conjunction {
            op: LogicalOp::Or,
            conditions,
        }
    }

    pub fn exists(subquery: CorrelatedSubquery) -> Self {
        Condition::Exists {
            op: ExistsType::Exists,
            subquery: Box::new(subquery),
        }
    }

    pub fn not_exists(subquery: CorrelatedSubquery) -> Self {
        Condition::Exists {
            op: ExistsType::NotExists,
            subquery: Box::new(subquery),
        }
    }

    /// Returns true if an `EXISTS` appears anywhere in the tree.
    pub fn has_exists(&self) -> bool {
        match self {
            Condition::Simple { .. } => false,
            Condition::Conjunction { conditions, .. } => conditions.iter().any(Condition::has_exists),
            Condition::Exists { .. } => true,
        }
    }

    /// Columns referenced by simple conditions.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Simple { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Condition::Conjunction { conditions, .. } => {
                for c in conditions {
                    c.collect_fields(out);
                }
            }
            Condition::Exists { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn test_operator_parse_display() {
        for s in ["=", "!=", "IN", "NOT IN", "NOT ILIKE", "SUPERSET", "NOT CONGRUENT"] {
            let op = SimpleOperator::parse(s).unwrap();
            assert_eq!(op.to_string(), s);
        }
        assert_eq!(
            SimpleOperator::parse("NOT LIKE"),
            Some(SimpleOperator::not(Comparison::Like))
        );
        assert_eq!(SimpleOperator::parse("BETWEEN"), None);
    }

    #[test]
    fn test_fields() {
        let c = Condition::and(vec![
            Condition::simple(Comparison::Eq, "a", 1),
            Condition::or(vec![
                Condition::simple(Comparison::Gt, "b", 2),
                Condition::simple(Comparison::Lt, "a", 0),
            ]),
        ]);
        assert_eq!(c.fields(), vec!["a", "b"]);
        assert!(!c.has_exists());
    }
}
