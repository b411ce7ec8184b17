//! Property-based tests for join reference counting.
//!
//! For any sequence of parent and child pushes, the child side sees one
//! hydrate per 0→1 transition of a key's reference count and one cleanup per
//! 1→0 transition.

use proptest::prelude::*;
use ripple_core::{row, DataType, SortOrder, TableSchema, Value};
use ripple_incremental::testing::{Catch, Snitch, SnitchLog, SnitchMessage};
use ripple_incremental::{FetchMode, Join, JoinArgs, MemorySource, SourceChange, Storage};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Clone, Debug)]
enum Op {
    /// Toggle comment `id` pointing at issue `key`.
    Comment { id: i64, key: i64 },
    /// Toggle issue `key`.
    Issue { key: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..8, 0i64..3).prop_map(|(id, key)| Op::Comment { id, key }),
        1 => (0i64..3).prop_map(|key| Op::Issue { key }),
    ]
}

fn tables() -> (MemorySource, MemorySource) {
    let comments = MemorySource::new(
        TableSchema::new("comment")
            .column("id", DataType::Int64)
            .column("issue_id", DataType::Int64)
            .primary_key(&["id"])
            .unwrap(),
    );
    let issues = MemorySource::new(
        TableSchema::new("issue")
            .column("id", DataType::Int64)
            .primary_key(&["id"])
            .unwrap(),
    );
    (comments, issues)
}

/// Counts child scans per key and mode.
fn child_scans(log: &SnitchLog, mode: FetchMode) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for message in log.borrow().iter() {
        if let SnitchMessage::Scan { name, mode: m, req } = message {
            if name != "issue" || *m != mode {
                continue;
            }
            let key = req
                .constraint
                .as_ref()
                .and_then(|c| c.get("id"))
                .and_then(Value::as_i64)
                .expect("child scans are constrained on the join key");
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

proptest! {
    /// Property: child hydrate / cleanup calls match reference count transitions.
    #[test]
    fn child_calls_match_refcount_transitions(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let (comments, issues) = tables();
        let log: SnitchLog = Rc::new(RefCell::new(Vec::new()));
        let join = Join::new(JoinArgs {
            parent: comments.connect(SortOrder::ascending(&["id"]), None).unwrap(),
            child: Snitch::new(
                issues.connect(SortOrder::ascending(&["id"]), None).unwrap(),
                "issue",
                log.clone(),
            ),
            storage: Storage::new(),
            parent_key: vec!["issue_id".into()],
            child_key: vec!["id".into()],
            relationship: "issue".into(),
            hidden: false,
        });
        let catch = Catch::new(join.clone());
        catch.hydrate();

        let mut parents: BTreeMap<i64, i64> = BTreeMap::new();
        let mut live_issues: BTreeMap<i64, ()> = BTreeMap::new();
        let mut refcount: BTreeMap<i64, usize> = BTreeMap::new();
        let mut expected_hydrates: BTreeMap<i64, usize> = BTreeMap::new();
        let mut expected_cleanups: BTreeMap<i64, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Comment { id, key } => {
                    if let Some(old_key) = parents.remove(&id) {
                        comments.push(SourceChange::Remove(row! { "id" => id })).unwrap();
                        let count = refcount.entry(old_key).or_insert(0);
                        *count -= 1;
                        if *count == 0 {
                            *expected_cleanups.entry(old_key).or_insert(0) += 1;
                        }
                    } else {
                        comments
                            .push(SourceChange::Add(row! { "id" => id, "issue_id" => key }))
                            .unwrap();
                        parents.insert(id, key);
                        let count = refcount.entry(key).or_insert(0);
                        if *count == 0 {
                            *expected_hydrates.entry(key).or_insert(0) += 1;
                        }
                        *count += 1;
                    }
                }
                Op::Issue { key } => {
                    if live_issues.remove(&key).is_some() {
                        issues.push(SourceChange::Remove(row! { "id" => key })).unwrap();
                    } else {
                        issues.push(SourceChange::Add(row! { "id" => key })).unwrap();
                        live_issues.insert(key, ());
                    }
                }
            }
            for (key, count) in &refcount {
                prop_assert_eq!(join.ref_count(&[Value::from(*key)]), *count as u64);
            }
        }

        catch.cleanup();
        for (key, count) in &refcount {
            if *count > 0 {
                *expected_cleanups.entry(*key).or_insert(0) += 1;
            }
        }

        prop_assert_eq!(child_scans(&log, FetchMode::Hydrate), expected_hydrates);
        prop_assert_eq!(child_scans(&log, FetchMode::Cleanup), expected_cleanups);
        prop_assert!(join.ref_counts().is_empty());
    }
}
