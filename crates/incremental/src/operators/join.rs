//! Join operator.
//!
//! Joins a parent and a child input on a (possibly compound) key and emits
//! hierarchical output: each parent node gains a relationship holding its
//! matching child nodes, in the child's own order.
//!
//! # Reference counting
//!
//! Join keeps, per distinct parent key value, the number of parent rows
//! that currently depend on that key's children:
//!
//! - 0 → 1: the child side is hydrated for the key
//! - n → n+1 (n > 0): the child side is only fetched
//! - 1 → 0: the child side is cleaned up for the key and the entry removed
//!
//! Decrementing a key that has no entry fetches and leaves storage alone.
//! That happens when a parent row reaches the join through a push without
//! ever having been hydrated.

use crate::change::Change;
use crate::node::Node;
use crate::operator::{
    output_to, Constraint, FetchMode, FetchRequest, Input, Output, OutputSlot, SourceSchema,
};
use crate::storage::Storage;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Row, Value};

/// Arguments for [`Join::new`].
pub struct JoinArgs {
    pub parent: Rc<dyn Input>,
    pub child: Rc<dyn Input>,
    pub storage: Storage<u64>,
    /// `parent_key[i]` joins with `child_key[i]`.
    pub parent_key: Vec<String>,
    pub child_key: Vec<String>,
    pub relationship: String,
    /// Hidden relationships are flattened away by views.
    pub hidden: bool,
}

pub struct Join {
    parent: Rc<dyn Input>,
    child: Rc<dyn Input>,
    storage: Storage<u64>,
    parent_key: Vec<String>,
    child_key: Vec<String>,
    relationship: String,
    schema: SourceSchema,
    output: OutputSlot,
}

impl Join {
    /// # Panics
    ///
    /// Panics if the two keys have different lengths.
    pub fn new(args: JoinArgs) -> Rc<Self> {
        assert_eq!(
            args.parent_key.len(),
            args.child_key.len(),
            "parent and child keys must have the same length"
        );

        let mut schema = args.parent.schema().clone();
        let mut child_schema = args.child.schema().clone();
        child_schema.is_hidden = args.hidden;
        schema
            .relationships
            .insert(args.relationship.clone(), child_schema);

        let join = Rc::new(Self {
            parent: args.parent,
            child: args.child,
            storage: args.storage,
            parent_key: args.parent_key,
            child_key: args.child_key,
            relationship: args.relationship,
            schema,
            output: OutputSlot::default(),
        });
        join.parent.set_output(output_to(&join, Join::push_parent));
        join.child.set_output(output_to(&join, Join::push_child));
        join
    }

    /// Name of the relationship this join attaches.
    pub fn relationship(&self) -> &str {
        &self.relationship
    }

    /// Current reference count for a parent key value.
    pub fn ref_count(&self, key: &[Value]) -> u64 {
        self.storage.get(key).unwrap_or(0)
    }

    /// Attaches the relationship to a parent node, adjusting the reference
    /// count according to `mode`.
    fn process_parent(&self, mut node: Node, mode: FetchMode) -> Node {
        let key = node.row.project(&self.parent_key);

        // Null never equals anything, so a null key has no children.
        if key.iter().any(Value::is_null) {
            node.relationships.insert(self.relationship.clone(), Vec::new());
            return node;
        }

        let child_mode = match mode {
            FetchMode::Fetch => FetchMode::Fetch,
            FetchMode::Hydrate => {
                let count = self.ref_count(&key);
                self.storage.set(key.clone(), count + 1);
                if count == 0 {
                    FetchMode::Hydrate
                } else {
                    FetchMode::Fetch
                }
            }
            FetchMode::Cleanup => match self.storage.get(&key) {
                Some(1) => {
                    self.storage.del(&key);
                    FetchMode::Cleanup
                }
                Some(count) => {
                    self.storage.set(key.clone(), count - 1);
                    FetchMode::Fetch
                }
                None => FetchMode::Fetch,
            },
        };

        let req = FetchRequest::constrained(Constraint::from_values(&self.child_key, &key));
        let children = self.child.collect(child_mode, &req);
        node.relationships.insert(self.relationship.clone(), children);
        node
    }

    fn push_parent(&self, change: Change) {
        match change {
            Change::Add(node) => {
                let node = self.process_parent(node, FetchMode::Hydrate);
                self.output.push(Change::Add(node));
            }
            Change::Remove(node) => {
                let node = self.process_parent(node, FetchMode::Cleanup);
                self.output.push(Change::Remove(node));
            }
            Change::Child { .. } => self.output.push(change),
            Change::Edit { old, new } => {
                if old.row.same_values(&new.row, &self.parent_key) {
                    let old = self.process_parent(old, FetchMode::Fetch);
                    let new = self.process_parent(new, FetchMode::Fetch);
                    self.output.push(Change::Edit { old, new });
                } else {
                    self.push_parent(Change::Remove(old));
                    self.push_parent(Change::Add(new));
                }
            }
        }
    }

    fn push_child(&self, change: Change) {
        match &change {
            Change::Add(node) | Change::Remove(node) => {
                let row = node.row.clone();
                self.push_child_change(&row, change);
            }
            Change::Child { row, .. } => {
                let row = row.clone();
                self.push_child_change(&row, change);
            }
            Change::Edit { old, new } => {
                if old.row.same_values(&new.row, &self.child_key) {
                    let row = new.row.clone();
                    self.push_child_change(&row, change);
                } else if let Change::Edit { old, new } = change {
                    // The child moved between parents.
                    let (old_row, new_row) = (old.row.clone(), new.row.clone());
                    self.push_child_change(&old_row, Change::Remove(old));
                    self.push_child_change(&new_row, Change::Add(new));
                }
            }
        }
    }

    /// Wraps `change` as a child change of every parent referencing `child_row`.
    fn push_child_change(&self, child_row: &Row, change: Change) {
        let key = child_row.project(&self.child_key);
        if key.iter().any(Value::is_null) {
            return;
        }
        let req = FetchRequest::constrained(Constraint::from_values(&self.parent_key, &key));
        let parents = self.parent.fetch(&req);
        for parent in parents {
            self.output
                .push(Change::child(parent.row, self.relationship.clone(), change.clone()));
        }
    }
}

impl Input for Join {
    fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        self.output.set(output);
    }

    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        self.parent.scan(mode, req, &mut |node| {
            let node = self.process_parent(node, mode);
            visit(node)
        });
    }

    fn destroy(&self) {
        self.parent.destroy();
        self.child.destroy();
    }
}

/// Reference counts of every key currently tracked, for diagnostics.
impl Join {
    pub fn ref_counts(&self) -> BTreeMap<Vec<Value>, u64> {
        self.storage.entries().into_iter().collect()
    }
}
