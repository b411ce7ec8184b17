//! Change types flowing through the operator graph.
//!
//! A `SourceChange` is what a caller pushes into a source: a flat row
//! mutation. A `Change` is what operators push to each other: the same
//! mutation lifted to [`Node`]s, plus the `Child` variant that lets a change
//! deep inside a relationship tree bubble up without re-materializing its
//! ancestors.

use crate::node::Node;
use alloc::boxed::Box;
use alloc::string::String;
use ripple_core::Row;

/// A row mutation pushed into a source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceChange {
    Add(Row),
    Remove(Row),
    /// Replaces `old` with `new`. The primary key may change.
    Edit { old: Row, new: Row },
}

impl SourceChange {
    /// Returns the row the change leaves behind (the removed row for removes).
    pub fn row(&self) -> &Row {
        match self {
            SourceChange::Add(row) | SourceChange::Remove(row) => row,
            SourceChange::Edit { new, .. } => new,
        }
    }
}

/// An incremental change to an operator's output stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Add(Node),
    Remove(Node),
    Edit {
        old: Node,
        new: Node,
    },
    /// A change to a relationship of the node identified by `row`.
    Child {
        row: Row,
        child: ChildChange,
    },
}

/// The nested part of a [`Change::Child`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildChange {
    pub relationship: String,
    pub change: Box<Change>,
}

impl Change {
    /// Creates a `Child` change wrapping `change` under `relationship`.
    pub fn child(row: Row, relationship: impl Into<String>, change: Change) -> Self {
        Change::Child {
            row,
            child: ChildChange {
                relationship: relationship.into(),
                change: Box::new(change),
            },
        }
    }

    /// Returns the row this change is about. For edits, the new row.
    pub fn row(&self) -> &Row {
        match self {
            Change::Add(node) | Change::Remove(node) => &node.row,
            Change::Edit { new, .. } => &new.row,
            Change::Child { row, .. } => row,
        }
    }

    /// Returns true for `Add`.
    #[inline]
    pub fn is_add(&self) -> bool {
        matches!(self, Change::Add(_))
    }

    /// Returns true for `Remove`.
    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, Change::Remove(_))
    }
}

impl From<SourceChange> for Change {
    fn from(change: SourceChange) -> Self {
        match change {
            SourceChange::Add(row) => Change::Add(Node::new(row)),
            SourceChange::Remove(row) => Change::Remove(Node::new(row)),
            SourceChange::Edit { old, new } => Change::Edit {
                old: Node::new(old),
                new: Node::new(new),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::row;

    #[test]
    fn test_change_row() {
        let add = Change::Add(Node::new(row! { "id" => 1 }));
        assert!(add.is_add());
        assert_eq!(add.row(), &row! { "id" => 1 });

        let edit = Change::Edit {
            old: Node::new(row! { "id" => 1, "v" => 1 }),
            new: Node::new(row! { "id" => 1, "v" => 2 }),
        };
        assert_eq!(edit.row().get("v"), &2.into());
    }

    #[test]
    fn test_child_wraps_change() {
        let inner = Change::Remove(Node::new(row! { "id" => "c1" }));
        let change = Change::child(row! { "id" => "i1" }, "comments", inner.clone());
        match change {
            Change::Child { row, child } => {
                assert_eq!(row, row! { "id" => "i1" });
                assert_eq!(child.relationship, "comments");
                assert_eq!(*child.change, inner);
            }
            _ => panic!("expected child change"),
        }
    }

    #[test]
    fn test_source_change_lifts_to_nodes() {
        let change: Change = SourceChange::Edit {
            old: row! { "id" => 1 },
            new: row! { "id" => 2 },
        }
        .into();
        match change {
            Change::Edit { old, new } => {
                assert!(old.relationships.is_empty());
                assert_eq!(new.row, row! { "id" => 2 });
            }
            _ => panic!("expected edit"),
        }
    }
}
