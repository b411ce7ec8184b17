//! End-to-end tests: build a pipeline from an AST, hydrate it, then push
//! source changes through it.

use proptest::prelude::*;
use ripple_core::{row, DataType, Row, SortOrder, TableSchema};
use ripple_incremental::testing::Catch;
use ripple_incremental::{Change, FetchRequest, Input, MemorySource, Node, SourceChange};
use ripple_query::ast::{Ast, Comparison, Condition, CorrelatedSubquery, Correlation};
use ripple_query::{build_pipeline, MemoryContext};
use std::collections::BTreeMap;

struct Fixture {
    issues: MemorySource,
    comments: MemorySource,
    ctx: MemoryContext,
}

fn fixture() -> Fixture {
    let issues = MemorySource::new(
        TableSchema::new("issue")
            .column("id", DataType::Int64)
            .column("open", DataType::Boolean)
            .primary_key(&["id"])
            .unwrap(),
    );
    let comments = MemorySource::new(
        TableSchema::new("comment")
            .column("id", DataType::Int64)
            .column("issue_id", DataType::Int64)
            .primary_key(&["id"])
            .unwrap(),
    );
    for (id, open) in [(1, true), (2, true), (3, false), (4, true)] {
        issues
            .push(SourceChange::Add(row! { "id" => id, "open" => open }))
            .unwrap();
    }
    comments
        .push(SourceChange::Add(row! { "id" => 10, "issue_id" => 1 }))
        .unwrap();
    let ctx = MemoryContext::new()
        .with_source(issues.clone())
        .with_source(comments.clone());
    Fixture {
        issues,
        comments,
        ctx,
    }
}

fn open_issues(limit: i64) -> Ast {
    Ast::new("issue")
        .order_by(SortOrder::ascending(&["id"]))
        .filter(Condition::simple(Comparison::Eq, "open", true))
        .limit(limit)
        .related(CorrelatedSubquery::new(
            Correlation::new("id", "issue_id"),
            Ast::new("comment").order_by(SortOrder::ascending(&["id"])),
            "comments",
        ))
}

fn issue(id: i64, open: bool) -> Row {
    row! { "id" => id, "open" => open }
}

fn with_comments(row: Row, comments: &[(i64, i64)]) -> Node {
    Node::new(row).with_relationship(
        "comments",
        comments
            .iter()
            .map(|(id, issue_id)| Node::new(row! { "id" => *id, "issue_id" => *issue_id }))
            .collect(),
    )
}

#[test]
fn hydrate_filtered_limited_join() {
    let f = fixture();
    let catch = Catch::new(build_pipeline(&open_issues(2), &f.ctx).unwrap());
    assert_eq!(
        catch.hydrate(),
        vec![
            with_comments(issue(1, true), &[(10, 1)]),
            with_comments(issue(2, true), &[]),
        ]
    );
}

#[test]
fn closing_an_issue_refills_the_window() {
    let f = fixture();
    let catch = Catch::new(build_pipeline(&open_issues(2), &f.ctx).unwrap());
    catch.hydrate();

    f.issues
        .push(SourceChange::Edit {
            old: issue(1, true),
            new: issue(1, false),
        })
        .unwrap();

    assert_eq!(
        catch.take_pushes(),
        vec![
            Change::Remove(with_comments(issue(1, true), &[(10, 1)])),
            Change::Add(with_comments(issue(4, true), &[])),
        ]
    );
}

#[test]
fn comment_changes_reach_visible_parents_only() {
    let f = fixture();
    let catch = Catch::new(build_pipeline(&open_issues(2), &f.ctx).unwrap());
    catch.hydrate();

    f.comments
        .push(SourceChange::Add(row! { "id" => 11, "issue_id" => 2 }))
        .unwrap();
    // Issue 4 is outside the window.
    f.comments
        .push(SourceChange::Add(row! { "id" => 12, "issue_id" => 4 }))
        .unwrap();

    assert_eq!(
        catch.take_pushes(),
        vec![Change::child(
            issue(2, true),
            "comments",
            Change::Add(Node::new(row! { "id" => 11, "issue_id" => 2 })),
        )]
    );
}

#[test]
fn exists_tracks_first_and_last_child() {
    let f = fixture();
    let ast = Ast::new("issue")
        .order_by(SortOrder::ascending(&["id"]))
        .filter(Condition::exists(CorrelatedSubquery::new(
            Correlation::new("id", "issue_id"),
            Ast::new("comment"),
            "comments",
        )));
    let catch = Catch::new(build_pipeline(&ast, &f.ctx).unwrap());
    assert_eq!(catch.hydrate(), vec![Node::new(issue(1, true))]);

    f.comments
        .push(SourceChange::Add(row! { "id" => 11, "issue_id" => 3 }))
        .unwrap();
    f.comments
        .push(SourceChange::Remove(row! { "id" => 10, "issue_id" => 1 }))
        .unwrap();

    assert_eq!(
        catch.take_pushes(),
        vec![
            Change::Add(Node::new(issue(3, false))),
            Change::Remove(Node::new(issue(1, true))),
        ]
    );
}

/// `issue WHERE open = true AND EXISTS (comment) ORDER BY id LIMIT n`.
fn open_issues_with_comments(limit: i64) -> Ast {
    Ast::new("issue")
        .order_by(SortOrder::ascending(&["id"]))
        .filter(Condition::and(vec![
            Condition::simple(Comparison::Eq, "open", true),
            Condition::exists(CorrelatedSubquery::new(
                Correlation::new("id", "issue_id"),
                Ast::new("comment"),
                "comments",
            )),
        ]))
        .limit(limit)
}

fn set_open(issues: &MemorySource, id: i64, open: bool) {
    issues
        .push(SourceChange::Edit {
            old: issue(id, !open),
            new: issue(id, open),
        })
        .unwrap();
}

#[test]
fn exists_sees_comments_added_while_filtered_out() {
    let f = fixture();
    let catch = Catch::new(build_pipeline(&open_issues_with_comments(3), &f.ctx).unwrap());
    assert_eq!(catch.hydrate(), vec![Node::new(issue(1, true))]);

    set_open(&f.issues, 2, false);
    f.comments
        .push(SourceChange::Add(row! { "id" => 11, "issue_id" => 2 }))
        .unwrap();
    assert!(catch.take_pushes().is_empty());

    set_open(&f.issues, 2, true);
    assert_eq!(catch.take_pushes(), vec![Change::Add(Node::new(issue(2, true)))]);

    set_open(&f.issues, 1, false);
    f.comments
        .push(SourceChange::Remove(row! { "id" => 10, "issue_id" => 1 }))
        .unwrap();
    set_open(&f.issues, 1, true);
    assert_eq!(
        catch.take_pushes(),
        vec![Change::Remove(Node::new(issue(1, true)))]
    );
    assert_eq!(catch.fetch(), vec![Node::new(issue(2, true))]);
}

#[derive(Clone, Debug)]
enum Step {
    Toggle(i64),
    AddComment(i64),
    RemoveComment(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1i64..=6).prop_map(Step::Toggle),
        (1i64..=6).prop_map(Step::AddComment),
        any::<usize>().prop_map(Step::RemoveComment),
    ]
}

/// Rows of a freshly built pipeline over the current source contents.
fn fresh_rows(ctx: &MemoryContext, ast: &Ast) -> Vec<Row> {
    let pipeline = build_pipeline(ast, ctx).unwrap();
    let rows = pipeline
        .fetch(&FetchRequest::all())
        .into_iter()
        .map(|n| n.row)
        .collect();
    pipeline.destroy();
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a hydrated pipeline kept up to date by pushes shows the
    /// same rows as one built from scratch, under a row filter combined
    /// with EXISTS and a limit.
    #[test]
    fn pushed_view_matches_fresh_pipeline(steps in prop::collection::vec(step_strategy(), 1..80)) {
        let issues = MemorySource::new(
            TableSchema::new("issue")
                .column("id", DataType::Int64)
                .column("open", DataType::Boolean)
                .primary_key(&["id"])
                .unwrap(),
        );
        let comments = MemorySource::new(
            TableSchema::new("comment")
                .column("id", DataType::Int64)
                .column("issue_id", DataType::Int64)
                .primary_key(&["id"])
                .unwrap(),
        );
        let mut open = BTreeMap::new();
        for id in 1..=6i64 {
            open.insert(id, id % 2 == 1);
            issues.push(SourceChange::Add(issue(id, id % 2 == 1))).unwrap();
        }
        let ctx = MemoryContext::new()
            .with_source(issues.clone())
            .with_source(comments.clone());
        let ast = open_issues_with_comments(3);
        let catch = Catch::new(build_pipeline(&ast, &ctx).unwrap());

        let mut view: BTreeMap<i64, Row> = BTreeMap::new();
        for node in catch.hydrate() {
            view.insert(node.row.get("id").as_i64().unwrap(), node.row);
        }

        let mut live: Vec<(i64, i64)> = Vec::new();
        let mut next_comment = 100i64;
        for step in steps {
            match step {
                Step::Toggle(id) => {
                    let now = !open[&id];
                    open.insert(id, now);
                    set_open(&issues, id, now);
                }
                Step::AddComment(issue_id) => {
                    next_comment += 1;
                    live.push((next_comment, issue_id));
                    comments
                        .push(SourceChange::Add(row! { "id" => next_comment, "issue_id" => issue_id }))
                        .unwrap();
                }
                Step::RemoveComment(i) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (id, issue_id) = live.remove(i % live.len());
                    comments
                        .push(SourceChange::Remove(row! { "id" => id, "issue_id" => issue_id }))
                        .unwrap();
                }
            }

            for change in catch.take_pushes() {
                match change {
                    Change::Add(node) => {
                        view.insert(node.row.get("id").as_i64().unwrap(), node.row);
                    }
                    Change::Remove(node) => {
                        view.remove(&node.row.get("id").as_i64().unwrap());
                    }
                    Change::Edit { old, new } => {
                        view.remove(&old.row.get("id").as_i64().unwrap());
                        view.insert(new.row.get("id").as_i64().unwrap(), new.row);
                    }
                    Change::Child { .. } => {}
                }
            }
            let pushed: Vec<Row> = view.values().cloned().collect();
            prop_assert_eq!(pushed, fresh_rows(&ctx, &ast));
        }
    }
}
