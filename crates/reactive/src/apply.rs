//! Applying operator changes to a materialized view.
//!
//! Lists are kept sorted by the schema's ordering and searched with a binary
//! search, so every change is `O(log n)` to locate. Hidden levels are
//! flattened: their children are attached directly to the nearest visible
//! ancestor.
//!
//! The assertions here guard the operator contract. A failed one means an
//! operator emitted a change that does not match what it emitted before.

use crate::view::{Entry, Format, View};
use alloc::collections::BTreeMap;
use core::cmp::Ordering;
use ripple_core::Row;
use ripple_incremental::{Change, Node, SourceSchema};

/// Applies `change` to `view`, the relationship view it belongs to.
pub fn apply_change(view: &mut View, change: Change, schema: &SourceSchema, format: &Format) {
    if schema.is_hidden {
        apply_hidden(view, change, schema, format);
        return;
    }

    match change {
        Change::Add(node) => {
            let entry = build_entry(node, schema, format);
            insert(view, entry, schema);
        }
        Change::Remove(node) => match view {
            View::Single(slot) => {
                assert!(slot.is_some(), "node does not exist");
                *slot = None;
            }
            View::List(list) => {
                let pos = search(list, &node.row, schema);
                let pos = pos.unwrap_or_else(|_| panic!("node does not exist"));
                list.remove(pos);
            }
        },
        Change::Child { row, child } => {
            let existing = match view {
                View::Single(slot) => slot.as_mut().unwrap_or_else(|| panic!("node does not exist")),
                View::List(list) => {
                    let pos = search(list, &row, schema);
                    let pos = pos.unwrap_or_else(|_| panic!("node does not exist"));
                    &mut list[pos]
                }
            };
            let child_schema = relationship_schema(schema, &child.relationship);
            let child_format = format.child(&child.relationship);
            let child_view = existing
                .relationships
                .entry(child.relationship)
                .or_insert_with(|| View::empty(&child_format));
            apply_change(child_view, *child.change, child_schema, &child_format);
        }
        Change::Edit { old, new } => match view {
            View::Single(slot) => {
                let entry = slot.as_mut().unwrap_or_else(|| panic!("node does not exist"));
                entry.row = new.row;
            }
            View::List(list) => {
                let pos = search(list, &old.row, schema);
                let pos = pos.unwrap_or_else(|_| panic!("node does not exist"));
                if schema.compare_rows(&old.row, &new.row) == Ordering::Equal {
                    list[pos].row = new.row;
                } else {
                    let mut entry = list.remove(pos);
                    entry.row = new.row;
                    let pos = search(list, &entry.row, schema);
                    let pos = pos.err().unwrap_or_else(|| panic!("node already exists"));
                    list.insert(pos, entry);
                }
            }
        },
    }
}

/// A hidden level contributes only its children.
fn apply_hidden(view: &mut View, change: Change, schema: &SourceSchema, format: &Format) {
    match change {
        Change::Add(node) => {
            for (name, children) in node.relationships {
                let child_schema = relationship_schema(schema, &name);
                for child in children {
                    apply_change(view, Change::Add(child), child_schema, format);
                }
            }
        }
        Change::Remove(node) => {
            for (name, children) in node.relationships {
                let child_schema = relationship_schema(schema, &name);
                for child in children {
                    apply_change(view, Change::Remove(child), child_schema, format);
                }
            }
        }
        // A hidden row edit that changed its relationships arrives as
        // remove + add.
        Change::Edit { .. } => {}
        Change::Child { child, .. } => {
            let child_schema = relationship_schema(schema, &child.relationship);
            apply_change(view, *child.change, child_schema, format);
        }
    }
}

fn build_entry(node: Node, schema: &SourceSchema, format: &Format) -> Entry {
    let mut relationships = BTreeMap::new();
    for (name, children) in node.relationships {
        let child_schema = relationship_schema(schema, &name);
        let child_format = format.child(&name);
        let mut child_view = View::empty(&child_format);
        for child in children {
            apply_change(&mut child_view, Change::Add(child), child_schema, &child_format);
        }
        relationships.insert(name, child_view);
    }
    Entry {
        row: node.row,
        relationships,
    }
}

fn insert(view: &mut View, entry: Entry, schema: &SourceSchema) {
    match view {
        View::Single(slot) => {
            assert!(slot.is_none(), "single output already exists");
            *slot = Some(entry);
        }
        View::List(list) => {
            let pos = search(list, &entry.row, schema);
            let pos = pos.err().unwrap_or_else(|| panic!("node already exists"));
            list.insert(pos, entry);
        }
    }
}

fn search(list: &[Entry], row: &Row, schema: &SourceSchema) -> Result<usize, usize> {
    list.binary_search_by(|entry| schema.compare_rows(&entry.row, row))
}

fn relationship_schema<'a>(schema: &'a SourceSchema, name: &str) -> &'a SourceSchema {
    schema
        .relationships
        .get(name)
        .unwrap_or_else(|| panic!("unknown relationship {name}"))
}
