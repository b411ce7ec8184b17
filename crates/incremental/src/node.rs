//! The hydration / fetch unit.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::Row;

/// A row plus its named relationships.
///
/// Each relationship is an ordered list of child nodes, owned by the parent.
/// The structure is a tree: a relationship never points back at an ancestor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Node {
    pub row: Row,
    pub relationships: BTreeMap<String, Vec<Node>>,
}

impl Node {
    /// Creates a node with no relationships.
    pub fn new(row: Row) -> Self {
        Self {
            row,
            relationships: BTreeMap::new(),
        }
    }

    /// Builder-style relationship attachment.
    pub fn with_relationship(mut self, name: impl Into<String>, children: Vec<Node>) -> Self {
        self.relationships.insert(name.into(), children);
        self
    }

    /// Returns the children under `name`, if the relationship is attached.
    pub fn relationship(&self, name: &str) -> Option<&[Node]> {
        self.relationships.get(name).map(Vec::as_slice)
    }
}

impl From<Row> for Node {
    fn from(row: Row) -> Self {
        Node::new(row)
    }
}
