//! Group-by operator.
//!
//! Emits one row per distinct value of the group columns, carrying the group
//! columns plus one column per aggregate alias. Groups are keyed (and
//! ordered) by the group columns.

use super::aggregate::{Accumulator, Aggregate, AggregateFn};
use crate::change::Change;
use crate::node::Node;
use crate::operator::{
    apply_request, output_to, FetchMode, FetchRequest, Input, Output, OutputSlot, SourceSchema,
};
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{DataType, Row, SortOrder, Value};

#[derive(Clone, Debug)]
struct GroupState {
    rows: u64,
    accumulators: Vec<Accumulator>,
}

type Groups = BTreeMap<Vec<Value>, GroupState>;

pub struct GroupBy {
    input: Rc<dyn Input>,
    group_by: Vec<String>,
    aggregates: Vec<Aggregate>,
    schema: SourceSchema,
    /// Present while hydrated.
    groups: RefCell<Option<Groups>>,
    hydrations: Cell<usize>,
    output: OutputSlot,
}

impl GroupBy {
    pub fn new(input: Rc<dyn Input>, group_by: Vec<String>, aggregates: Vec<Aggregate>) -> Rc<Self> {
        let input_schema = input.schema();
        let mut columns = BTreeMap::new();
        for column in &group_by {
            if let Some(dt) = input_schema.columns.get(column) {
                columns.insert(column.clone(), *dt);
            }
        }
        for agg in &aggregates {
            let dt = match agg.function {
                AggregateFn::Count => DataType::Int64,
                AggregateFn::Sum | AggregateFn::Avg => DataType::Float64,
                AggregateFn::Min | AggregateFn::Max => agg
                    .column
                    .as_ref()
                    .and_then(|c| input_schema.columns.get(c).copied())
                    .unwrap_or(DataType::Json),
            };
            columns.insert(agg.alias.clone(), dt);
        }
        let schema = SourceSchema {
            table_name: input_schema.table_name.clone(),
            columns,
            primary_key: group_by.clone(),
            sort: SortOrder::ascending(&group_by),
            relationships: BTreeMap::new(),
            is_hidden: false,
        };

        let op = Rc::new(Self {
            input,
            group_by,
            aggregates,
            schema,
            groups: RefCell::new(None),
            hydrations: Cell::new(0),
            output: OutputSlot::default(),
        });
        op.input.set_output(output_to(&op, GroupBy::push));
        op
    }

    fn new_group(&self) -> GroupState {
        GroupState {
            rows: 0,
            accumulators: self.aggregates.iter().map(Aggregate::accumulator).collect(),
        }
    }

    fn output_row(&self, key: &[Value], group: &GroupState) -> Row {
        let mut row: Row = self.group_by.iter().cloned().zip(key.iter().cloned()).collect();
        for (agg, acc) in self.aggregates.iter().zip(&group.accumulators) {
            row.set(agg.alias.clone(), acc.value());
        }
        row
    }

    fn accumulate(&self, groups: &mut Groups, row: &Row, diff: i64) {
        let key = row.project(&self.group_by);
        let group = groups.entry(key.clone()).or_insert_with(|| self.new_group());
        for acc in &mut group.accumulators {
            acc.apply(row, diff);
        }
        group.rows = group.rows.saturating_add_signed(diff);
        if group.rows == 0 {
            groups.remove(&key);
        }
    }

    fn compute(&self, mode: FetchMode) -> Groups {
        let mut groups = Groups::new();
        self.input.scan(mode, &FetchRequest::all(), &mut |node| {
            self.accumulate(&mut groups, &node.row, 1);
            true
        });
        groups
    }

    fn emit(&self, groups: &Groups, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        let mut rows: Vec<Row> = groups
            .iter()
            .map(|(key, group)| self.output_row(key, group))
            .collect();
        rows.sort_by(|a, b| self.schema.compare_rows(a, b));
        apply_request(&mut rows, req, &self.schema.sort);
        for row in rows {
            if !visit(Node::new(row)) {
                break;
            }
        }
    }

    /// Applies `diffs` to the live groups and returns the resulting output
    /// changes.
    fn apply(&self, diffs: &[(&Row, i64)]) -> Vec<Change> {
        let mut guard = self.groups.borrow_mut();
        let Some(groups) = guard.as_mut() else {
            return Vec::new();
        };

        let mut keys: Vec<Vec<Value>> = Vec::new();
        for (row, _) in diffs {
            let key = row.project(&self.group_by);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let before: Vec<Option<Row>> = keys
            .iter()
            .map(|k| groups.get(k).map(|g| self.output_row(k, g)))
            .collect();
        for (row, diff) in diffs {
            self.accumulate(groups, row, *diff);
        }

        let mut changes = Vec::new();
        for (key, before) in keys.iter().zip(before) {
            let after = groups.get(key).map(|g| self.output_row(key, g));
            match (before, after) {
                (None, Some(after)) => changes.push(Change::Add(Node::new(after))),
                (Some(before), None) => changes.push(Change::Remove(Node::new(before))),
                (Some(before), Some(after)) if before != after => changes.push(Change::Edit {
                    old: Node::new(before),
                    new: Node::new(after),
                }),
                _ => {}
            }
        }
        changes
    }

    fn push(&self, change: Change) {
        let changes = match &change {
            Change::Add(node) => self.apply(&[(&node.row, 1)]),
            Change::Remove(node) => self.apply(&[(&node.row, -1)]),
            Change::Edit { old, new } => self.apply(&[(&old.row, -1), (&new.row, 1)]),
            Change::Child { .. } => Vec::new(),
        };
        for change in changes {
            self.output.push(change);
        }
    }
}

impl Input for GroupBy {
    fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        self.output.set(output);
    }

    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        match mode {
            FetchMode::Hydrate => {
                self.hydrations.set(self.hydrations.get() + 1);
                if self.groups.borrow().is_none() {
                    let groups = self.compute(FetchMode::Hydrate);
                    *self.groups.borrow_mut() = Some(groups);
                }
            }
            FetchMode::Cleanup => {
                let remaining = self.hydrations.get().saturating_sub(1);
                self.hydrations.set(remaining);
                if remaining == 0 {
                    self.compute(FetchMode::Cleanup);
                    if let Some(groups) = self.groups.borrow_mut().take() {
                        self.emit(&groups, req, visit);
                    }
                    return;
                }
            }
            FetchMode::Fetch => {}
        }

        let snapshot = self.groups.borrow().clone();
        match snapshot {
            Some(groups) => self.emit(&groups, req, visit),
            None => self.emit(&self.compute(FetchMode::Fetch), req, visit),
        }
    }

    fn destroy(&self) {
        self.input.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::SourceChange;
    use crate::source::MemorySource;
    use crate::testing::Catch;
    use alloc::vec;
    use ripple_core::{row, TableSchema};

    fn setup() -> (MemorySource, Rc<Catch>) {
        let source = MemorySource::new(
            TableSchema::new("issue")
                .column("id", DataType::Int64)
                .column("owner", DataType::String)
                .column("points", DataType::Int64)
                .primary_key(&["id"])
                .unwrap(),
        );
        for (id, owner, points) in [(1, "a", 3), (2, "b", 5), (3, "a", 7)] {
            source
                .push(SourceChange::Add(row! { "id" => id, "owner" => owner, "points" => points }))
                .unwrap();
        }
        let conn = source.connect(SortOrder::ascending(&["id"]), None).unwrap();
        let group_by = GroupBy::new(
            conn,
            vec!["owner".into()],
            vec![
                Aggregate::count("n"),
                Aggregate::new(AggregateFn::Sum, Some("points"), "total"),
                Aggregate::new(AggregateFn::Max, Some("points"), "top"),
            ],
        );
        (source, Catch::new(group_by))
    }

    fn group(owner: &str, n: i64, total: f64, top: i64) -> Row {
        row! { "owner" => owner, "n" => n, "total" => total, "top" => top }
    }

    #[test]
    fn test_hydrate_groups() {
        let (_source, catch) = setup();
        let rows: Vec<Row> = catch.hydrate().into_iter().map(|n| n.row).collect();
        assert_eq!(rows, vec![group("a", 2, 10.0, 7), group("b", 1, 5.0, 5)]);
    }

    #[test]
    fn test_push_updates_groups() {
        let (source, catch) = setup();
        catch.hydrate();

        source
            .push(SourceChange::Add(row! { "id" => 4, "owner" => "c", "points" => 1 }))
            .unwrap();
        source
            .push(SourceChange::Remove(row! { "id" => 3 }))
            .unwrap();
        source
            .push(SourceChange::Remove(row! { "id" => 2 }))
            .unwrap();

        assert_eq!(
            catch.take_pushes(),
            vec![
                Change::Add(Node::new(group("c", 1, 1.0, 1))),
                Change::Edit {
                    old: Node::new(group("a", 2, 10.0, 7)),
                    new: Node::new(group("a", 1, 3.0, 3)),
                },
                Change::Remove(Node::new(group("b", 1, 5.0, 5))),
            ]
        );
    }

    #[test]
    fn test_edit_moving_between_groups() {
        let (source, catch) = setup();
        catch.hydrate();
        source
            .push(SourceChange::Edit {
                old: row! { "id" => 2, "owner" => "b", "points" => 5 },
                new: row! { "id" => 2, "owner" => "a", "points" => 5 },
            })
            .unwrap();
        assert_eq!(
            catch.take_pushes(),
            vec![
                Change::Remove(Node::new(group("b", 1, 5.0, 5))),
                Change::Edit {
                    old: Node::new(group("a", 2, 10.0, 7)),
                    new: Node::new(group("a", 3, 15.0, 7)),
                },
            ]
        );
    }

    #[test]
    fn test_fetch_without_hydrate_is_transient() {
        let (source, catch) = setup();
        assert_eq!(catch.fetch().len(), 2);
        source
            .push(SourceChange::Add(row! { "id" => 9, "owner" => "z", "points" => 0 }))
            .unwrap();
        assert!(catch.take_pushes().is_empty());
        assert_eq!(catch.fetch().len(), 3);
    }
}
