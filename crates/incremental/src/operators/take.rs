//! Take (limit) operator.
//!
//! Keeps the first `limit` nodes of its input under the input's ordering.
//! The last accepted row is the window's *bound*: pushes sorting after it
//! are outside the window and dropped, pushes at or before it change the
//! window and may evict the bound or pull in the next row past it.
//!
//! With a partition key the window is kept per distinct partition value, so
//! a limited subquery gets one window per parent.

use crate::change::Change;
use crate::node::Node;
use crate::operator::{
    output_to, Constraint, FetchMode, FetchRequest, Input, Output, OutputSlot, SourceSchema,
    Start, StartBasis,
};
use crate::storage::Storage;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use ripple_core::{Row, Value};

/// Window state of one partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TakeState {
    pub size: usize,
    pub bound: Option<Row>,
}

pub struct Take {
    input: Rc<dyn Input>,
    storage: Storage<TakeState>,
    limit: usize,
    partition_key: Option<Vec<String>>,
    /// Largest bound of any partition.
    max_bound: RefCell<Option<Row>>,
    output: OutputSlot,
}

impl Take {
    pub fn new(
        input: Rc<dyn Input>,
        storage: Storage<TakeState>,
        limit: usize,
        partition_key: Option<Vec<String>>,
    ) -> Rc<Self> {
        let take = Rc::new(Self {
            input,
            storage,
            limit,
            partition_key,
            max_bound: RefCell::new(None),
            output: OutputSlot::default(),
        });
        take.input.set_output(output_to(&take, Take::push));
        take
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Window state of the partition `row` belongs to.
    pub fn state_for(&self, row: &Row) -> Option<TakeState> {
        self.storage.get(&self.partition_of_row(row))
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        self.input.schema().compare_rows(a, b)
    }

    fn partition_of_row(&self, row: &Row) -> Vec<Value> {
        match &self.partition_key {
            Some(key) => row.project(key),
            None => Vec::new(),
        }
    }

    fn partition_of_constraint(&self, constraint: Option<&Constraint>) -> Vec<Value> {
        match (&self.partition_key, constraint) {
            (Some(key), Some(c)) => c.values_for(key),
            _ => Vec::new(),
        }
    }

    /// Returns true if `req` addresses exactly one partition.
    fn addresses_partition(&self, req: &FetchRequest) -> bool {
        match (&self.partition_key, &req.constraint) {
            (None, _) => true,
            (Some(key), Some(c)) => c.covers_exactly(key),
            (Some(_), None) => false,
        }
    }

    fn set_state(&self, key: Vec<Value>, size: usize, bound: Option<Row>) {
        if let Some(bound) = &bound {
            let mut max_bound = self.max_bound.borrow_mut();
            let raise = max_bound
                .as_ref()
                .map_or(true, |max| self.compare(bound, max) == Ordering::Greater);
            if raise {
                *max_bound = Some(bound.clone());
            }
        }
        self.storage.set(key, TakeState { size, bound });
    }

    /// Fetches up to `n` nodes of one partition starting from `row`.
    fn fetch_from(
        &self,
        constraint: &Option<Constraint>,
        row: &Row,
        basis: StartBasis,
        reverse: bool,
        n: usize,
    ) -> Vec<Node> {
        let req = FetchRequest {
            constraint: constraint.clone(),
            start: Some(Start {
                row: row.clone(),
                basis,
            }),
            reverse,
        };
        self.input.fetch_n(&req, n)
    }

    /// Like [`fetch_from`](Self::fetch_from) for a row the window's
    /// bookkeeping guarantees to exist.
    fn must_fetch(
        &self,
        constraint: &Option<Constraint>,
        row: &Row,
        basis: StartBasis,
        reverse: bool,
    ) -> Node {
        match self.fetch_from(constraint, row, basis, reverse, 1).pop() {
            Some(node) => node,
            None => panic!("take window out of sync with its input"),
        }
    }

    /// First hydration of a partition: consumes the input up to the limit
    /// even if `visit` stops early, so the window state is complete.
    fn hydrate_window(&self, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        let key = self.partition_of_constraint(req.constraint.as_ref());
        if self.limit == 0 {
            self.set_state(key, 0, None);
            return;
        }
        let mut size = 0;
        let mut bound = None;
        let mut downstream_done = false;
        self.input.scan(FetchMode::Hydrate, req, &mut |node| {
            bound = Some(node.row.clone());
            size += 1;
            if !downstream_done {
                downstream_done = !visit(node);
            }
            size < self.limit
        });
        self.set_state(key, size, bound);
    }

    /// Cleans up a partition. The whole partition is scanned, not just the
    /// window: rows pushed past the bound still left state in the operators
    /// below. Only window nodes are visited.
    fn cleanup_window(&self, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        self.storage
            .del(&self.partition_of_constraint(req.constraint.as_ref()));
        if self.limit == 0 {
            return;
        }
        let mut size = 0;
        let mut downstream_done = false;
        self.input.scan(FetchMode::Cleanup, req, &mut |node| {
            size += 1;
            if size <= self.limit && !downstream_done {
                downstream_done = !visit(node);
            }
            true
        });
    }

    /// Scans one partition's window.
    fn scan_window(
        &self,
        mode: FetchMode,
        req: &FetchRequest,
        bound: &Row,
        visit: &mut dyn FnMut(Node) -> bool,
    ) {
        self.input.scan(mode, req, &mut |node| {
            if self.compare(&node.row, bound) == Ordering::Greater {
                // Past the bound. Reverse scans reach the window later.
                return req.reverse;
            }
            visit(node)
        });
    }

    /// Scan not addressing a single partition: each node is checked against
    /// the bound of its own partition.
    fn scan_partitions(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        let Some(max_bound) = self.max_bound.borrow().clone() else {
            return;
        };
        self.input.scan(mode, req, &mut |node| {
            if self.compare(&node.row, &max_bound) == Ordering::Greater {
                return req.reverse;
            }
            let inside = self
                .state_for(&node.row)
                .and_then(|state| state.bound)
                .map_or(false, |bound| self.compare(&bound, &node.row) != Ordering::Less);
            if inside {
                visit(node)
            } else {
                true
            }
        });
    }

    fn state_and_constraint(&self, row: &Row) -> Option<(TakeState, Vec<Value>, Option<Constraint>)> {
        let key = self.partition_of_row(row);
        let state = self.storage.get(&key)?;
        let constraint = self
            .partition_key
            .as_ref()
            .map(|pk| Constraint::from_values(pk, &key));
        Some((state, key, constraint))
    }

    fn push(&self, change: Change) {
        let row = change.row().clone();
        match change {
            Change::Edit { old, new } => self.push_edit(old, new),
            Change::Add(node) => self.push_add(&row, node),
            Change::Remove(node) => self.push_remove(&row, node),
            Change::Child { .. } => {
                let Some((state, _, _)) = self.state_and_constraint(&row) else {
                    return;
                };
                let inside = state
                    .bound
                    .map_or(false, |bound| self.compare(&row, &bound) != Ordering::Greater);
                if inside {
                    self.output.push(change);
                }
            }
        }
    }

    fn push_add(&self, row: &Row, node: Node) {
        let Some((state, key, constraint)) = self.state_and_constraint(row) else {
            return;
        };

        if state.size < self.limit {
            let bound = match state.bound {
                Some(bound) if self.compare(&bound, row) != Ordering::Less => bound,
                _ => row.clone(),
            };
            self.set_state(key, state.size + 1, Some(bound));
            self.output.push(Change::Add(node));
            return;
        }

        let Some(bound) = state.bound else {
            return;
        };
        if self.compare(row, &bound) != Ordering::Less {
            return;
        }

        // The new row displaces the bound.
        let (bound_node, before_bound) = if self.limit == 1 {
            (self.must_fetch(&constraint, &bound, StartBasis::At, false), None)
        } else {
            let mut nodes = self
                .fetch_from(&constraint, &bound, StartBasis::At, true, 2)
                .into_iter();
            match nodes.next() {
                Some(bound_node) => (bound_node, nodes.next()),
                None => panic!("take window out of sync with its input"),
            }
        };
        let new_bound = match before_bound {
            Some(before) if self.compare(row, &before.row) != Ordering::Greater => before.row,
            _ => row.clone(),
        };
        self.set_state(key, state.size, Some(new_bound));
        self.output.push(Change::Remove(bound_node));
        self.output.push(Change::Add(node));
    }

    fn push_remove(&self, row: &Row, node: Node) {
        let Some((state, key, constraint)) = self.state_and_constraint(row) else {
            return;
        };
        let Some(bound) = state.bound else {
            return;
        };
        if self.compare(row, &bound) == Ordering::Greater {
            return;
        }

        // Candidate replacement: the first row past the old bound. Fall back
        // to the row just before it when the input is exhausted.
        let mut new_bound: Option<(Node, bool)> = self
            .fetch_from(&constraint, &bound, StartBasis::After, true, 1)
            .pop()
            .map(|before| {
                let past = self.compare(&before.row, &bound) == Ordering::Greater;
                (before, past)
            });
        if !new_bound.as_ref().map_or(false, |(_, past)| *past) {
            let req = FetchRequest {
                constraint: constraint.clone(),
                start: Some(Start {
                    row: bound.clone(),
                    basis: StartBasis::At,
                }),
                reverse: false,
            };
            self.input.scan(FetchMode::Fetch, &req, &mut |candidate| {
                let past = self.compare(&candidate.row, &bound) == Ordering::Greater;
                new_bound = Some((candidate, past));
                !past
            });
        }

        match new_bound {
            Some((refill, true)) => {
                self.set_state(key, state.size, Some(refill.row.clone()));
                self.output.push(Change::Remove(node));
                self.output.push(Change::Add(refill));
            }
            other => {
                self.set_state(key, state.size - 1, other.map(|(n, _)| n.row));
                self.output.push(Change::Remove(node));
            }
        }
    }

    fn push_edit(&self, old: Node, new: Node) {
        if let Some(pk) = &self.partition_key {
            if !old.row.same_values(&new.row, pk) {
                self.push(Change::Remove(old));
                self.push(Change::Add(new));
                return;
            }
        }

        let Some((state, key, constraint)) = self.state_and_constraint(&old.row) else {
            return;
        };
        let Some(bound) = state.bound.clone() else {
            return;
        };
        let old_cmp = self.compare(&old.row, &bound);
        let new_cmp = self.compare(&new.row, &bound);

        let replace_bound_and_forward = |old: Node, new: Node| {
            self.set_state(key.clone(), state.size, Some(new.row.clone()));
            self.output.push(Change::Edit { old, new });
        };

        match old_cmp {
            // The bound row itself changed.
            Ordering::Equal => match new_cmp {
                Ordering::Equal => self.output.push(Change::Edit { old, new }),
                Ordering::Less => {
                    if self.limit == 1 {
                        replace_bound_and_forward(old, new);
                        return;
                    }
                    let before =
                        self.must_fetch(&constraint, &bound, StartBasis::After, true);
                    self.set_state(key.clone(), state.size, Some(before.row));
                    self.output.push(Change::Edit { old, new });
                }
                Ordering::Greater => {
                    let next = self.must_fetch(&constraint, &bound, StartBasis::At, false);
                    if self.compare(&next.row, &new.row) == Ordering::Equal {
                        replace_bound_and_forward(old, new);
                        return;
                    }
                    self.set_state(key.clone(), state.size, Some(next.row.clone()));
                    self.output.push(Change::Remove(old));
                    self.output.push(Change::Add(next));
                }
            },
            // Old row was outside the window.
            Ordering::Greater => match new_cmp {
                Ordering::Greater | Ordering::Equal => {}
                Ordering::Less => {
                    let mut nodes = self
                        .fetch_from(&constraint, &bound, StartBasis::At, true, 2)
                        .into_iter();
                    let (Some(old_bound), Some(new_bound)) = (nodes.next(), nodes.next()) else {
                        panic!("take window out of sync with its input");
                    };
                    self.set_state(key.clone(), state.size, Some(new_bound.row));
                    self.output.push(Change::Remove(old_bound));
                    self.output.push(Change::Add(new));
                }
            },
            // Old row was inside the window.
            Ordering::Less => match new_cmp {
                Ordering::Less | Ordering::Equal => self.output.push(Change::Edit { old, new }),
                Ordering::Greater => {
                    let after = self.must_fetch(&constraint, &bound, StartBasis::After, false);
                    if self.compare(&after.row, &new.row) == Ordering::Equal {
                        replace_bound_and_forward(old, new);
                        return;
                    }
                    self.set_state(key.clone(), state.size, Some(after.row.clone()));
                    self.output.push(Change::Remove(old));
                    self.output.push(Change::Add(after));
                }
            },
        }
    }
}

impl Input for Take {
    fn schema(&self) -> &SourceSchema {
        self.input.schema()
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        self.output.set(output);
    }

    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        if !self.addresses_partition(req) {
            self.scan_partitions(mode, req, visit);
            return;
        }
        if mode == FetchMode::Cleanup {
            self.cleanup_window(req, visit);
            return;
        }

        let key = self.partition_of_constraint(req.constraint.as_ref());
        match self.storage.get(&key) {
            Some(state) => {
                if let Some(bound) = state.bound {
                    self.scan_window(mode, req, &bound, visit);
                }
            }
            None if mode == FetchMode::Hydrate => self.hydrate_window(req, visit),
            None => {
                // Not hydrated: a transient read of the first `limit` nodes.
                let mut size = 0;
                if self.limit == 0 {
                    return;
                }
                self.input.scan(FetchMode::Fetch, req, &mut |node| {
                    size += 1;
                    visit(node) && size < self.limit
                });
            }
        }
    }

    fn destroy(&self) {
        self.input.destroy();
    }
}
