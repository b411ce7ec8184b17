//! Exists / not-exists operator.
//!
//! Sits on top of a [`Join`](super::Join) and keeps only the parents whose
//! relationship is non-empty (`EXISTS`) or empty (`NOT EXISTS`). Membership
//! flips exactly when a parent's relationship size crosses zero.
//!
//! Output shape differs between the two: `EXISTS` removes the relationship
//! from its nodes and schema, `NOT EXISTS` keeps it as an explicit empty
//! list.

use crate::change::Change;
use crate::node::Node;
use crate::operator::{
    output_to, Constraint, FetchMode, FetchRequest, Input, Output, OutputSlot, SourceSchema,
};
use crate::storage::Storage;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Row, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExistsType {
    Exists,
    NotExists,
}

pub struct Exists {
    input: Rc<dyn Input>,
    /// Relationship size per parent primary key, cached while hydrated.
    storage: Storage<u64>,
    relationship: String,
    exists_type: ExistsType,
    schema: SourceSchema,
    output: OutputSlot,
}

impl Exists {
    /// # Panics
    ///
    /// Panics if the input does not attach `relationship`.
    pub fn new(
        input: Rc<dyn Input>,
        storage: Storage<u64>,
        relationship: impl Into<String>,
        exists_type: ExistsType,
    ) -> Rc<Self> {
        let relationship = relationship.into();
        let mut schema = input.schema().clone();
        assert!(
            schema.relationships.contains_key(&relationship),
            "input does not attach relationship {relationship}"
        );
        if exists_type == ExistsType::Exists {
            schema.relationships.remove(&relationship);
        }

        let exists = Rc::new(Self {
            input,
            storage,
            relationship,
            exists_type,
            schema,
            output: OutputSlot::default(),
        });
        exists.input.set_output(output_to(&exists, Exists::push));
        exists
    }

    /// Cached relationship size of the parent identified by `row`.
    pub fn cached_size(&self, row: &Row) -> Option<u64> {
        self.storage.get(&self.key_of(row))
    }

    fn key_of(&self, row: &Row) -> Vec<Value> {
        row.project(&self.schema.primary_key)
    }

    fn matches(&self, size: u64) -> bool {
        match self.exists_type {
            ExistsType::Exists => size > 0,
            ExistsType::NotExists => size == 0,
        }
    }

    fn size_of(&self, node: &Node) -> u64 {
        node.relationship(&self.relationship)
            .map_or(0, |children| children.len() as u64)
    }

    /// Shapes a node for output.
    fn shape(&self, mut node: Node) -> Node {
        match self.exists_type {
            ExistsType::Exists => {
                node.relationships.remove(&self.relationship);
            }
            ExistsType::NotExists => {
                node.relationships.insert(self.relationship.clone(), Vec::new());
            }
        }
        node
    }

    /// Re-reads the parent identified by `row` from the input.
    fn fetch_parent(&self, row: &Row) -> Option<Node> {
        let req =
            FetchRequest::constrained(Constraint::from_row(&self.schema.primary_key, row));
        self.input.fetch_first(&req)
    }

    /// Current relationship size of the parent identified by `row`, from the
    /// cache when present.
    fn current_size(&self, row: &Row) -> u64 {
        match self.cached_size(row) {
            Some(size) => size,
            None => self
                .fetch_parent(row)
                .map_or(0, |node| self.size_of(&node)),
        }
    }

    fn push(&self, change: Change) {
        match change {
            Change::Add(node) => {
                let size = self.size_of(&node);
                self.storage.set(self.key_of(&node.row), size);
                if self.matches(size) {
                    self.output.push(Change::Add(self.shape(node)));
                }
            }
            Change::Remove(node) => {
                let size = self.size_of(&node);
                self.storage.del(&self.key_of(&node.row));
                if self.matches(size) {
                    self.output.push(Change::Remove(self.shape(node)));
                }
            }
            Change::Edit { old, new } => {
                if self.schema.same_key(&old.row, &new.row) {
                    if self.matches(self.current_size(&new.row)) {
                        self.output.push(Change::Edit {
                            old: self.shape(old),
                            new: self.shape(new),
                        });
                    }
                } else {
                    self.push(Change::Remove(old));
                    self.push(Change::Add(new));
                }
            }
            Change::Child { row, child } => {
                if child.relationship != self.relationship {
                    if self.matches(self.current_size(&row)) {
                        self.output.push(Change::Child { row, child });
                    }
                    return;
                }
                match *child.change {
                    Change::Add(_) => self.on_size_change(&row, 1),
                    Change::Remove(_) => self.on_size_change(&row, -1),
                    // Neither changes the size.
                    Change::Edit { .. } | Change::Child { .. } => {}
                }
            }
        }
    }

    /// Applies a ±1 change to the relationship of the parent identified by
    /// `row`, emitting the parent when membership flips.
    fn on_size_change(&self, row: &Row, delta: i64) {
        let key = self.key_of(row);
        let (old_size, new_size) = match self.storage.get(&key) {
            Some(old) => {
                let new = if delta > 0 { old + 1 } else { old.saturating_sub(1) };
                self.storage.set(key, new);
                (old, new)
            }
            None => {
                // Not hydrated here: the input already reflects the change.
                let new = self.fetch_parent(row).map_or(0, |n| self.size_of(&n));
                let old = if delta > 0 { new.saturating_sub(1) } else { new + 1 };
                (old, new)
            }
        };

        let (was_in, is_in) = (self.matches(old_size), self.matches(new_size));
        if was_in == is_in {
            return;
        }
        let Some(parent) = self.fetch_parent(row) else {
            return;
        };
        let parent = self.shape(parent);
        if is_in {
            self.output.push(Change::Add(parent));
        } else {
            self.output.push(Change::Remove(parent));
        }
    }
}

impl Input for Exists {
    fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        self.output.set(output);
    }

    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        self.input.scan(mode, req, &mut |node| {
            let size = self.size_of(&node);
            let key = self.key_of(&node.row);
            match mode {
                FetchMode::Hydrate => self.storage.set(key, size),
                FetchMode::Cleanup => {
                    self.storage.del(&key);
                }
                FetchMode::Fetch => {}
            }
            if self.matches(size) {
                visit(self.shape(node))
            } else {
                true
            }
        });
    }

    fn destroy(&self) {
        self.input.destroy();
    }
}
