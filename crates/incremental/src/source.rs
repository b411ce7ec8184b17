//! In-memory ordered row source.
//!
//! A `MemorySource` is the single writable root of a table. Consumers
//! `connect` with an ordering and receive an [`Input`] that reads the table
//! in that order. Every connection reads the same rows; each distinct
//! `(constraint columns, ordering)` pair gets its own sorted index, built
//! lazily from the primary index and dropped once no connection uses it.
//!
//! # Push fan-out
//!
//! `push` validates the change, then hands it to each live connection in
//! connection order. While connection `i` is being pushed, scans from
//! connections `0..=i` already see the change through an overlay and later
//! connections do not. Only after every connection has been pushed is the
//! change written into the indexes. This is what lets a self-join, or two
//! connections of one pipeline, observe each change exactly once.

use crate::change::{Change, SourceChange};
use crate::node::Node;
use crate::operator::{
    apply_request, FetchMode, FetchRequest, Input, Output, RowPredicate, SourceSchema,
};
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use hashbrown::HashSet;
use ripple_core::{Direction, Error, Result, Row, SortOrder, TableSchema, Value};

// =========================================================================
// Index keys
// =========================================================================

/// A position in an index: a concrete value or one of the two extremes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Bound {
    Min,
    Val(Value),
    Max,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct KeyPart {
    bound: Bound,
    direction: Direction,
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        self.direction.apply(self.bound.cmp(&other.bound))
    }
}

type IndexKey = Vec<KeyPart>;

fn index_key(sort: &SortOrder, row: &Row) -> IndexKey {
    sort.parts()
        .iter()
        .map(|p| KeyPart {
            bound: Bound::Val(row.get(&p.column).clone()),
            direction: p.direction,
        })
        .collect()
}

/// The first key of the rows matching `constraint` under `sort`.
fn lower_bound(sort: &SortOrder, constraint: &crate::operator::Constraint) -> IndexKey {
    sort.parts()
        .iter()
        .map(|p| {
            let bound = match constraint.get(&p.column) {
                Some(v) => Bound::Val(v.clone()),
                // Whichever extreme sorts first under the part's direction.
                None => match p.direction {
                    Direction::Asc => Bound::Min,
                    Direction::Desc => Bound::Max,
                },
            };
            KeyPart {
                bound,
                direction: p.direction,
            }
        })
        .collect()
}

struct Index {
    data: BTreeMap<IndexKey, Row>,
    used_by: HashSet<u64>,
}

// =========================================================================
// Source state
// =========================================================================

struct Connection {
    id: u64,
    output: Option<Rc<dyn Output>>,
    sort: SortOrder,
    filter: Option<RowPredicate>,
    /// Hydrations minus cleanups. Pushes reach only connections above zero.
    hydrations: usize,
}

struct Overlay {
    output_index: usize,
    change: SourceChange,
}

struct SourceState {
    table: TableSchema,
    primary_sort: SortOrder,
    primary: BTreeMap<IndexKey, Row>,
    indexes: BTreeMap<SortOrder, Index>,
    connections: Vec<Connection>,
    next_connection: u64,
    overlay: Option<Overlay>,
}

impl SourceState {
    fn position(&self, id: u64) -> usize {
        match self.connections.iter().position(|c| c.id == id) {
            Some(pos) => pos,
            None => panic!("connection {} not found", id),
        }
    }

    /// The index order for a scan: constrained columns first, then the
    /// connection's own order without them.
    fn index_sort(&self, conn: &Connection, req: &FetchRequest) -> SortOrder {
        let mut sort = SortOrder::new();
        if let Some(constraint) = &req.constraint {
            for c in constraint.columns() {
                sort = sort.then(c, Direction::Asc);
            }
        }
        for part in conn.sort.parts() {
            if !sort.mentions(&part.column) {
                sort = sort.then(part.column.clone(), part.direction);
            }
        }
        sort
    }

    fn ensure_index(&mut self, sort: &SortOrder, used_by: u64) {
        if *sort == self.primary_sort {
            return;
        }
        if let Some(index) = self.indexes.get_mut(sort) {
            index.used_by.insert(used_by);
            return;
        }
        let data = self
            .primary
            .values()
            .map(|row| (index_key(sort, row), row.clone()))
            .collect();
        let mut used = HashSet::new();
        used.insert(used_by);
        self.indexes.insert(
            sort.clone(),
            Index {
                data,
                used_by: used,
            },
        );
    }

    fn index_data(&self, sort: &SortOrder) -> &BTreeMap<IndexKey, Row> {
        match self.indexes.get(sort) {
            Some(index) => &index.data,
            None => &self.primary,
        }
    }

    /// Materializes the rows a scan from connection `pos` delivers.
    fn rows_for(&mut self, pos: usize, req: &FetchRequest) -> Vec<Row> {
        let sort = self.index_sort(&self.connections[pos], req);
        let id = self.connections[pos].id;
        self.ensure_index(&sort, id);

        let data = self.index_data(&sort);
        let mut rows: Vec<Row> = match &req.constraint {
            Some(constraint) => data
                .range(lower_bound(&sort, constraint)..)
                .map(|(_, row)| row)
                .take_while(|row| constraint.matches(row))
                .cloned()
                .collect(),
            None => data.values().cloned().collect(),
        };

        let conn = &self.connections[pos];
        if let Some(overlay) = &self.overlay {
            if pos <= overlay.output_index {
                let (add, remove) = match &overlay.change {
                    SourceChange::Add(row) => (Some(row), None),
                    SourceChange::Remove(row) => (None, Some(row)),
                    SourceChange::Edit { old, new } => (Some(new), Some(old)),
                };
                let in_scope = |row: &Row| {
                    req.constraint
                        .as_ref()
                        .map_or(true, |c| c.matches(row))
                };
                if let Some(remove) = remove.filter(|r| in_scope(r)) {
                    if let Some(i) = rows.iter().position(|r| r == remove) {
                        rows.remove(i);
                    }
                }
                if let Some(add) = add.filter(|r| in_scope(r)) {
                    let at = rows.partition_point(|r| conn.sort.compare(r, add) == Ordering::Less);
                    rows.insert(at, add.clone());
                }
            }
        }

        if let Some(filter) = &conn.filter {
            rows.retain(|r| filter(r));
        }
        apply_request(&mut rows, &FetchRequest { constraint: None, ..req.clone() }, &conn.sort);
        rows
    }

    fn stored(&self, row: &Row) -> Option<&Row> {
        self.primary.get(&index_key(&self.primary_sort, row))
    }

    fn describe(&self, row: &Row) -> alloc::string::String {
        self.table.describe_key(row)
    }

    fn apply(&mut self, change: &SourceChange) {
        let primary_sort = self.primary_sort.clone();
        let sorts: Vec<SortOrder> = core::iter::once(primary_sort)
            .chain(self.indexes.keys().cloned())
            .collect();
        for sort in sorts {
            let data = match self.indexes.get_mut(&sort) {
                Some(index) => &mut index.data,
                None => &mut self.primary,
            };
            match change {
                SourceChange::Add(row) => {
                    data.insert(index_key(&sort, row), row.clone());
                }
                SourceChange::Remove(row) => {
                    data.remove(&index_key(&sort, row));
                }
                SourceChange::Edit { old, new } => {
                    data.remove(&index_key(&sort, old));
                    data.insert(index_key(&sort, new), new.clone());
                }
            }
        }
    }
}

// =========================================================================
// MemorySource
// =========================================================================

/// An in-memory table that feeds one or more operator pipelines.
///
/// Cloning yields another handle to the same table.
#[derive(Clone)]
pub struct MemorySource {
    state: Rc<RefCell<SourceState>>,
}

impl MemorySource {
    pub fn new(table: TableSchema) -> Self {
        let primary_sort = table.primary_key_order();
        Self {
            state: Rc::new(RefCell::new(SourceState {
                table,
                primary_sort,
                primary: BTreeMap::new(),
                indexes: BTreeMap::new(),
                connections: Vec::new(),
                next_connection: 0,
                overlay: None,
            })),
        }
    }

    /// Returns the table schema.
    pub fn table(&self) -> TableSchema {
        self.state.borrow().table.clone()
    }

    /// Connects a consumer reading the table in `sort` order.
    ///
    /// Primary-key columns missing from `sort` are appended so the order is
    /// total. `filter` narrows what scans return; pushes are not filtered.
    pub fn connect(&self, sort: SortOrder, filter: Option<RowPredicate>) -> Result<Rc<SourceInput>> {
        let mut state = self.state.borrow_mut();
        state.table.validate_order(&sort)?;
        let sort = sort.with_primary_key(state.table.primary_key_columns());
        let id = state.next_connection;
        state.next_connection += 1;
        state.connections.push(Connection {
            id,
            output: None,
            sort: sort.clone(),
            filter,
            hydrations: 0,
        });
        let schema = SourceSchema::for_table(&state.table, sort);
        Ok(Rc::new(SourceInput {
            source: self.clone(),
            id,
            schema,
        }))
    }

    /// Applies `change` and fans it out to every live connection.
    pub fn push(&self, change: SourceChange) -> Result<()> {
        let change = self.validate(change)?;

        let targets: Vec<(usize, Rc<dyn Output>)> = {
            let state = self.state.borrow();
            state
                .connections
                .iter()
                .enumerate()
                .filter(|(_, c)| c.hydrations > 0)
                .filter_map(|(i, c)| c.output.clone().map(|o| (i, o)))
                .collect()
        };

        let output_change = Change::from(change.clone());
        for (output_index, output) in targets {
            self.state.borrow_mut().overlay = Some(Overlay {
                output_index,
                change: change.clone(),
            });
            output.push(output_change.clone());
        }

        let mut state = self.state.borrow_mut();
        state.overlay = None;
        state.apply(&change);
        Ok(())
    }

    /// Checks the change against the primary index, substituting the stored
    /// row for the row being removed or replaced.
    fn validate(&self, change: SourceChange) -> Result<SourceChange> {
        let state = self.state.borrow();
        let table = state.table.name();
        match change {
            SourceChange::Add(row) => {
                state.table.validate_row(&row)?;
                if state.stored(&row).is_some() {
                    return Err(Error::row_exists(table, state.describe(&row)));
                }
                Ok(SourceChange::Add(row))
            }
            SourceChange::Remove(row) => match state.stored(&row) {
                Some(stored) => Ok(SourceChange::Remove(stored.clone())),
                None => Err(Error::row_not_found(table, state.describe(&row))),
            },
            SourceChange::Edit { old, new } => {
                state.table.validate_row(&new)?;
                let stored = match state.stored(&old) {
                    Some(stored) => stored.clone(),
                    None => return Err(Error::row_not_found(table, state.describe(&old))),
                };
                if !state.table.primary_key_columns().is_empty()
                    && !new.same_values(&old, state.table.primary_key_columns())
                    && state.stored(&new).is_some()
                {
                    return Err(Error::row_exists(table, state.describe(&new)));
                }
                Ok(SourceChange::Edit { old: stored, new })
            }
        }
    }

    /// Returns every row in primary-key order.
    pub fn rows(&self) -> Vec<Row> {
        self.state.borrow().primary.values().cloned().collect()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.state.borrow().primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the orderings that currently have a secondary index.
    pub fn index_orders(&self) -> Vec<SortOrder> {
        self.state.borrow().indexes.keys().cloned().collect()
    }

    fn disconnect(&self, id: u64) {
        let mut state = self.state.borrow_mut();
        let pos = state.position(id);
        state.connections.remove(pos);
        state.indexes.retain(|_, index| {
            index.used_by.remove(&id);
            !index.used_by.is_empty()
        });
    }

    fn scan(&self, id: u64, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        let rows = {
            let mut state = self.state.borrow_mut();
            let pos = state.position(id);
            let conn = &mut state.connections[pos];
            match mode {
                FetchMode::Hydrate => conn.hydrations += 1,
                FetchMode::Cleanup => conn.hydrations = conn.hydrations.saturating_sub(1),
                FetchMode::Fetch => {}
            }
            state.rows_for(pos, req)
        };
        for row in rows {
            if !visit(Node::new(row)) {
                break;
            }
        }
    }
}

/// One connection to a [`MemorySource`].
pub struct SourceInput {
    source: MemorySource,
    id: u64,
    schema: SourceSchema,
}

impl Input for SourceInput {
    fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        let mut state = self.source.state.borrow_mut();
        let pos = state.position(self.id);
        state.connections[pos].output = Some(output);
    }

    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        self.source.scan(self.id, mode, req, visit);
    }

    fn destroy(&self) {
        self.source.disconnect(self.id);
    }
}
