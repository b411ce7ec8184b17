//! Property-based tests for compiled conditions.
//!
//! A compiled predicate must agree with evaluating the condition tree
//! directly, for arbitrary AND / OR nesting and operator mixes.

use proptest::prelude::*;
use ripple_core::{row, Row, Value};
use ripple_query::ast::{Comparison, Condition, LogicalOp, SimpleOperator};
use ripple_query::predicate::{compare, compile};

const FIELDS: [&str; 3] = ["a", "b", "c"];

fn comparison_strategy() -> impl Strategy<Value = Comparison> {
    prop_oneof![
        Just(Comparison::Eq),
        Just(Comparison::Ne),
        Just(Comparison::Lt),
        Just(Comparison::Le),
        Just(Comparison::Gt),
        Just(Comparison::Ge),
        Just(Comparison::In),
        Just(Comparison::Intersects),
        Just(Comparison::Subset),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (0i64..4).prop_map(Value::Int64),
        prop::collection::vec(0i64..4, 0..3)
            .prop_map(|v| Value::Array(v.into_iter().map(Value::Int64).collect())),
    ]
}

fn simple_strategy() -> impl Strategy<Value = Condition> {
    (comparison_strategy(), any::<bool>(), 0..FIELDS.len(), value_strategy()).prop_map(
        |(cmp, negated, field, value)| {
            let op = if negated {
                SimpleOperator::not(cmp)
            } else {
                SimpleOperator::new(cmp)
            };
            Condition::simple(op, FIELDS[field], value)
        },
    )
}

fn condition_strategy() -> impl Strategy<Value = Condition> {
    simple_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Condition::and),
            prop::collection::vec(inner, 0..4).prop_map(Condition::or),
        ]
    })
}

fn row_strategy() -> impl Strategy<Value = Row> {
    (0i64..4, 0i64..4, value_strategy()).prop_map(|(a, b, c)| row! { "a" => a, "b" => b, "c" => c })
}

/// Reference evaluation straight off the tree.
fn evaluate(condition: &Condition, row: &Row) -> bool {
    match condition {
        Condition::Simple { op, field, value } => {
            compare(op.comparison, row.get(field), value) != op.negated
        }
        Condition::Conjunction { op, conditions } => {
            let results: Vec<bool> = conditions.iter().map(|c| evaluate(c, row)).collect();
            match op {
                LogicalOp::And => results.iter().all(|r| *r),
                LogicalOp::Or => results.iter().any(|r| *r),
            }
        }
        Condition::Exists { .. } => unreachable!("generated conditions have no EXISTS"),
    }
}

proptest! {
    /// Property: the compiled predicate matches direct evaluation of the tree.
    #[test]
    fn compiled_matches_tree(condition in condition_strategy(), rows in prop::collection::vec(row_strategy(), 1..8)) {
        let predicate = compile(&condition).unwrap();
        for row in &rows {
            prop_assert_eq!(predicate(row), evaluate(&condition, row));
        }
    }

    /// Property: `NOT op` is the negation of `op` on every row.
    #[test]
    fn not_inverts(cmp in comparison_strategy(), value in value_strategy(), row in row_strategy()) {
        let positive = compile(&Condition::simple(SimpleOperator::new(cmp), "c", value.clone())).unwrap();
        let negative = compile(&Condition::simple(SimpleOperator::not(cmp), "c", value)).unwrap();
        prop_assert_eq!(positive(&row), !negative(&row));
    }
}
