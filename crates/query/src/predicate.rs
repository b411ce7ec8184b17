//! Condition compiler.
//!
//! Turns a [`Condition`] tree into a [`RowPredicate`]. Patterns are compiled
//! once, here, so a malformed `LIKE` fails the build rather than a row.
//!
//! Semantics:
//!
//! - Ordering comparisons against null are false. `=` and `!=` compare
//!   values directly.
//! - `IN` takes an array on the right.
//! - Set operators treat a scalar on either side as a one-element set, and
//!   null as the empty set.
//! - `NOT op` inverts the result of `op`.
//! - `AND` / `OR` short-circuit left to right.

use crate::ast::{Comparison, Condition, LogicalOp, SimpleOperator};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use ripple_core::pattern_match::LikePattern;
use ripple_core::{Error, Result, Row, Value};
use ripple_incremental::RowPredicate;

/// Compiles `condition` into a row predicate.
///
/// # Errors
///
/// Returns `Error::InvalidPattern` for a malformed `LIKE` / `ILIKE` pattern
/// and `Error::InvalidOperation` for an `EXISTS`, which is not a row
/// predicate.
pub fn compile(condition: &Condition) -> Result<RowPredicate> {
    let eval = compile_eval(condition)?;
    Ok(Rc::new(move |row: &Row| eval.eval(row)))
}

/// A compiled condition tree.
enum Eval {
    Compare {
        field: String,
        op: SimpleOperator,
        value: Value,
    },
    Like {
        field: String,
        pattern: LikePattern,
        negated: bool,
    },
    And(Vec<Eval>),
    Or(Vec<Eval>),
}

impl Eval {
    fn eval(&self, row: &Row) -> bool {
        match self {
            Eval::Compare { field, op, value } => {
                let result = compare(op.comparison, row.get(field), value);
                result != op.negated
            }
            Eval::Like {
                field,
                pattern,
                negated,
            } => {
                let matched = row
                    .get(field)
                    .as_str()
                    .map_or(false, |s| pattern.matches(s));
                matched != *negated
            }
            Eval::And(children) => children.iter().all(|c| c.eval(row)),
            Eval::Or(children) => children.iter().any(|c| c.eval(row)),
        }
    }
}

fn compile_eval(condition: &Condition) -> Result<Eval> {
    match condition {
        Condition::Simple { op, field, value } => match op.comparison {
            Comparison::Like | Comparison::ILike => {
                let Some(pattern) = value.as_str() else {
                    return Err(Error::invalid_pattern("LIKE pattern must be a string"));
                };
                let pattern = LikePattern::compile(pattern, op.comparison == Comparison::ILike)?;
                Ok(Eval::Like {
                    field: field.clone(),
                    pattern,
                    negated: op.negated,
                })
            }
            _ => Ok(Eval::Compare {
                field: field.clone(),
                op: *op,
                value: value.clone(),
            }),
        },
        Condition::Conjunction { op, conditions } => {
            let children = conditions
                .iter()
                .map(compile_eval)
                .collect::<Result<Vec<_>>>()?;
            Ok(match op {
                LogicalOp::And => Eval::And(children),
                LogicalOp::Or => Eval::Or(children),
            })
        }
        Condition::Exists { .. } => Err(Error::invalid_operation(
            "EXISTS cannot be evaluated as a row predicate",
        )),
    }
}

/// Evaluates one comparison. `LIKE` is handled by the compiled pattern.
pub fn compare(comparison: Comparison, lhs: &Value, rhs: &Value) -> bool {
    match comparison {
        Comparison::Eq => lhs == rhs,
        Comparison::Ne => lhs != rhs,
        Comparison::Lt => ordered(lhs, rhs, |o| o == Ordering::Less),
        Comparison::Le => ordered(lhs, rhs, |o| o != Ordering::Greater),
        Comparison::Gt => ordered(lhs, rhs, |o| o == Ordering::Greater),
        Comparison::Ge => ordered(lhs, rhs, |o| o != Ordering::Less),
        Comparison::In => rhs.as_set().contains(lhs),
        Comparison::Like | Comparison::ILike => {
            match (lhs.as_str(), rhs.as_str()) {
                (Some(s), Some(p)) => LikePattern::compile(p, comparison == Comparison::ILike)
                    .map_or(false, |pattern| pattern.matches(s)),
                _ => false,
            }
        }
        Comparison::Intersects => intersects(lhs.as_set(), rhs.as_set()),
        Comparison::Disjoint => !intersects(lhs.as_set(), rhs.as_set()),
        Comparison::Superset => is_subset(rhs.as_set(), lhs.as_set()),
        Comparison::Subset => is_subset(lhs.as_set(), rhs.as_set()),
        Comparison::Congruent => congruent(lhs.as_set(), rhs.as_set()),
        Comparison::Incongruent => !congruent(lhs.as_set(), rhs.as_set()),
    }
}

fn ordered(lhs: &Value, rhs: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if lhs.is_null() || rhs.is_null() {
        return false;
    }
    accept(lhs.cmp(rhs))
}

fn intersects(a: &[Value], b: &[Value]) -> bool {
    a.iter().any(|v| b.contains(v))
}

fn is_subset(a: &[Value], b: &[Value]) -> bool {
    a.iter().all(|v| b.contains(v))
}

fn congruent(a: &[Value], b: &[Value]) -> bool {
    is_subset(a, b) && is_subset(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Comparison::*;
    use alloc::vec;
    use ripple_core::row;

    fn arr(values: &[i64]) -> Value {
        Value::Array(values.iter().map(|v| Value::Int64(*v)).collect())
    }

    fn eval(op: SimpleOperator, left: impl Into<Value>, right: impl Into<Value>) -> bool {
        let pred = compile(&Condition::simple(op, "f", right)).unwrap();
        pred(&row! { "f" => left.into() })
    }

    /// One row of the operator truth table.
    struct Case {
        op: Comparison,
        left: Value,
        right: Value,
        expected: bool,
    }

    fn case(op: Comparison, left: impl Into<Value>, right: impl Into<Value>, expected: bool) -> Case {
        Case {
            op,
            left: left.into(),
            right: right.into(),
            expected,
        }
    }

    #[test]
    fn test_operator_truth_table() {
        let strs = |s: &[&str]| Value::Array(s.iter().map(|v| Value::from(*v)).collect());
        let cases = vec![
            case(Eq, 1, 1, true),
            case(Ne, 1, 1, false),
            case(Eq, "a", "a", true),
            case(Ne, "a", "a", false),
            case(Eq, true, true, true),
            case(Ne, true, true, false),
            case(Eq, 1, 2, false),
            case(Ne, 1, 2, true),
            case(Eq, "a", "b", false),
            case(Ne, "a", "b", true),
            case(Eq, true, false, false),
            case(Ne, true, false, true),
            case(Gt, 1, 1, false),
            case(Ge, 1, 1, true),
            case(Lt, 1, 1, false),
            case(Le, 1, 1, true),
            case(Gt, "a", "a", false),
            case(Ge, "a", "a", true),
            case(Lt, "a", "a", false),
            case(Le, "a", "a", true),
            case(Gt, 1, 2, false),
            case(Ge, 1, 2, false),
            case(Lt, 1, 2, true),
            case(Le, 1, 2, true),
            case(Gt, "a", "b", false),
            case(Ge, "a", "b", false),
            case(Lt, "a", "b", true),
            case(Le, "a", "b", true),
            case(In, 1, arr(&[1, 2, 3]), true),
            case(In, 1, arr(&[2, 3]), false),
            case(In, "a", strs(&["a", "b", "c"]), true),
            case(In, "a", strs(&["b", "c"]), false),
            case(In, true, Value::Array(vec![true.into(), false.into()]), true),
            case(In, true, Value::Array(vec![false.into()]), false),
            case(Like, "abc", "abc", true),
            case(Like, "abc", "ABC", false),
            case(Like, "abc", "ab", false),
            case(Like, "abc", "ab%", true),
            case(Like, "abc", "%bc", true),
            case(Like, "abbc", "a%c", true),
            case(Like, "abd", "a%c", false),
            case(Like, "abc", "a_c", true),
            case(Like, "abc", "a__", true),
            case(Like, "abc", "_bc", true),
            case(Like, "abc", "___", true),
            case(Like, "abc", "%", true),
            case(Like, "abc", "_", false),
            case(Like, "abc", "a", false),
            case(Like, "a%b", "a\\%b", true),
            case(Like, "axb", "a\\%b", false),
            case(ILike, "abc", "ABC", true),
            case(ILike, "abc", "A_C", true),
            case(Intersects, arr(&[1, 2]), arr(&[2, 3]), true),
            case(Intersects, arr(&[1]), arr(&[2, 3]), false),
            case(Disjoint, arr(&[1]), arr(&[2, 3]), true),
            case(Superset, arr(&[1, 2, 3]), arr(&[1, 3]), true),
            case(Superset, arr(&[1]), arr(&[1, 3]), false),
            case(Subset, arr(&[1, 3]), arr(&[1, 2, 3]), true),
            case(Congruent, arr(&[3, 1]), arr(&[1, 3]), true),
            case(Incongruent, arr(&[3, 1]), arr(&[1, 3]), false),
            // Scalars are one-element sets.
            case(Intersects, 2, arr(&[2, 3]), true),
            case(Subset, 2, arr(&[2, 3]), true),
            case(Superset, 2, arr(&[2, 3]), false),
            case(Congruent, 2, arr(&[2]), true),
        ];

        for c in cases {
            let positive = eval(SimpleOperator::new(c.op), c.left.clone(), c.right.clone());
            assert_eq!(positive, c.expected, "{:?} {:?} {:?}", c.left, c.op, c.right);
            let negative = eval(SimpleOperator::not(c.op), c.left.clone(), c.right.clone());
            assert_eq!(negative, !c.expected, "NOT {:?} {:?} {:?}", c.left, c.op, c.right);
        }
    }

    #[test]
    fn test_null_ordering_is_false() {
        assert!(!eval(SimpleOperator::new(Lt), Value::Null, 1));
        assert!(!eval(SimpleOperator::new(Ge), 1, Value::Null));
        assert!(eval(SimpleOperator::new(Eq), Value::Null, Value::Null));
    }

    #[test]
    fn test_invalid_like_pattern() {
        let c = Condition::simple(Like, "f", "abc\\");
        let err = compile(&c).err().unwrap();
        assert_eq!(
            alloc::format!("{err}"),
            "LIKE pattern must not end with escape character"
        );
    }

    #[test]
    fn test_and_or() {
        let c = Condition::or(vec![
            Condition::and(vec![
                Condition::simple(Eq, "a", 1),
                Condition::simple(Eq, "b", 2),
            ]),
            Condition::simple(Eq, "c", 3),
        ]);
        let pred = compile(&c).unwrap();
        assert!(pred(&row! { "a" => 1, "b" => 2, "c" => 0 }));
        assert!(pred(&row! { "a" => 0, "b" => 0, "c" => 3 }));
        assert!(!pred(&row! { "a" => 1, "b" => 0, "c" => 0 }));
        // Empty conjunctions follow `all` / `any`.
        assert!(compile(&Condition::and(vec![])).unwrap()(&row! {}));
        assert!(!compile(&Condition::or(vec![])).unwrap()(&row! {}));
    }
}
