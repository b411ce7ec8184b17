//! The pull / push contract every operator implements.
//!
//! Operators form a graph rooted at sources. Each operator is an [`Input`]
//! to the operator above it and an [`Output`] of the operator below it.
//!
//! - Pull: `scan` in one of three [`FetchMode`]s. `Hydrate` registers the
//!   caller as a live dependent and lets stateful operators build their
//!   state, `Fetch` is a one-shot read, `Cleanup` releases what `Hydrate`
//!   built.
//! - Push: a [`Change`] handed to [`Output::push`], which synchronously walks
//!   the graph to completion before returning.
//!
//! Operators are not reentrant and pushes are never interleaved. State lives
//! in `RefCell`s that are never borrowed across a call into another operator.

use crate::change::Change;
use crate::node::Node;
use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use ripple_core::{DataType, Row, SortOrder, TableSchema, Value};

/// A per-row predicate, shared between operators and source connections.
pub type RowPredicate = Rc<dyn Fn(&Row) -> bool>;

// =========================================================================
// Fetch requests
// =========================================================================

/// Which side of the pull contract a scan belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// One-shot read.
    Fetch,
    /// Initial materialization; registers the caller for future pushes.
    Hydrate,
    /// Releases the state `Hydrate` built.
    Cleanup,
}

/// An ordered list of `column = value` restrictions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Constraint {
    parts: Vec<(String, Value)>,
}

impl Constraint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `column = value`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parts.push((column.into(), value.into()));
        self
    }

    /// Builds `columns[i] = values[i]`.
    pub fn from_values<S: AsRef<str>>(columns: &[S], values: &[Value]) -> Self {
        Self {
            parts: columns
                .iter()
                .zip(values)
                .map(|(c, v)| (String::from(c.as_ref()), v.clone()))
                .collect(),
        }
    }

    /// Builds `columns[i] = row[columns[i]]`.
    pub fn from_row<S: AsRef<str>>(columns: &[S], row: &Row) -> Self {
        Self::from_values(columns, &row.project(columns))
    }

    pub fn parts(&self) -> &[(String, Value)] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the value constrained for `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.parts.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(c, _)| c.as_str())
    }

    /// Returns the constrained values in the order of `columns`.
    pub fn values_for<S: AsRef<str>>(&self, columns: &[S]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.get(c.as_ref()).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Returns true if the constraint names exactly the given columns.
    pub fn covers_exactly<S: AsRef<str>>(&self, columns: &[S]) -> bool {
        self.parts.len() == columns.len()
            && columns.iter().all(|c| self.get(c.as_ref()).is_some())
    }

    /// Returns true if `row` satisfies every part.
    pub fn matches(&self, row: &Row) -> bool {
        self.parts.iter().all(|(c, v)| row.get(c) == v)
    }
}

/// Where a scan starts relative to `Start::row`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StartBasis {
    /// One row before the first row at or past `row`.
    Before,
    /// The first row at or past `row`.
    At,
    /// The first row strictly past `row`.
    After,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Start {
    pub row: Row,
    pub basis: StartBasis,
}

/// Arguments of a `scan`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub constraint: Option<Constraint>,
    pub start: Option<Start>,
    /// Scan in the reverse of the input's ordering. `start` is then
    /// interpreted in that reversed direction.
    pub reverse: bool,
}

impl FetchRequest {
    /// An unconstrained request.
    pub fn all() -> Self {
        Self::default()
    }

    /// A request restricted to `constraint`.
    pub fn constrained(constraint: Constraint) -> Self {
        Self {
            constraint: Some(constraint),
            ..Self::default()
        }
    }

    /// Builder-style start.
    pub fn starting(mut self, row: Row, basis: StartBasis) -> Self {
        self.start = Some(Start { row, basis });
        self
    }

    /// Builder-style reverse.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Applies constraint, direction and start of `req` to rows already sorted
/// by `sort`.
pub(crate) fn apply_request(rows: &mut Vec<Row>, req: &FetchRequest, sort: &SortOrder) {
    if let Some(constraint) = &req.constraint {
        rows.retain(|r| constraint.matches(r));
    }
    if req.reverse {
        rows.reverse();
    }
    if let Some(start) = &req.start {
        let cmp = |a: &Row, b: &Row| {
            let ord = sort.compare(a, b);
            if req.reverse {
                ord.reverse()
            } else {
                ord
            }
        };
        let at = rows
            .iter()
            .position(|r| cmp(r, &start.row) != Ordering::Less)
            .unwrap_or(rows.len());
        let skip = match start.basis {
            StartBasis::At => at,
            StartBasis::Before => at.saturating_sub(1),
            StartBasis::After => rows
                .iter()
                .position(|r| cmp(r, &start.row) == Ordering::Greater)
                .unwrap_or(rows.len()),
        };
        rows.drain(..skip);
    }
}

// =========================================================================
// Schema
// =========================================================================

/// The shape of an operator's output: table identity, ordering and the
/// relationship tree it attaches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSchema {
    pub table_name: String,
    pub columns: BTreeMap<String, DataType>,
    pub primary_key: Vec<String>,
    /// Total order of the output, ending in the primary key.
    pub sort: SortOrder,
    pub relationships: BTreeMap<String, SourceSchema>,
    /// Hidden levels are flattened away by views.
    pub is_hidden: bool,
}

impl SourceSchema {
    /// The schema of a table read under `sort`.
    pub fn for_table(table: &TableSchema, sort: SortOrder) -> Self {
        Self {
            table_name: table.name().into(),
            columns: table.columns().clone(),
            primary_key: table.primary_key_columns().to_vec(),
            sort,
            relationships: BTreeMap::new(),
            is_hidden: false,
        }
    }

    /// Compares two rows under this schema's ordering.
    #[inline]
    pub fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        self.sort.compare(a, b)
    }

    /// Returns true if `a` and `b` have the same primary key.
    pub fn same_key(&self, a: &Row, b: &Row) -> bool {
        a.same_values(b, &self.primary_key)
    }
}

// =========================================================================
// Input / Output
// =========================================================================

/// Receives pushed changes.
pub trait Output {
    fn push(&self, change: Change);
}

/// The pull side of an operator.
pub trait Input {
    /// Returns the output schema.
    fn schema(&self) -> &SourceSchema;

    /// Wires the single downstream output.
    fn set_output(&self, output: Rc<dyn Output>);

    /// Delivers nodes in schema order to `visit` until it returns false.
    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool);

    /// Tears down this operator and everything upstream of it.
    fn destroy(&self);

    /// Collects a scan.
    fn collect(&self, mode: FetchMode, req: &FetchRequest) -> Vec<Node> {
        let mut out = Vec::new();
        self.scan(mode, req, &mut |node| {
            out.push(node);
            true
        });
        out
    }

    /// One-shot read of everything matching `req`.
    fn fetch(&self, req: &FetchRequest) -> Vec<Node> {
        self.collect(FetchMode::Fetch, req)
    }

    /// Materializes `req` and registers for pushes.
    fn hydrate(&self, req: &FetchRequest) -> Vec<Node> {
        self.collect(FetchMode::Hydrate, req)
    }

    /// Releases what `hydrate(req)` built.
    fn cleanup(&self, req: &FetchRequest) -> Vec<Node> {
        self.collect(FetchMode::Cleanup, req)
    }

    /// Fetches at most `n` nodes.
    fn fetch_n(&self, req: &FetchRequest, n: usize) -> Vec<Node> {
        let mut out = Vec::new();
        if n == 0 {
            return out;
        }
        self.scan(FetchMode::Fetch, req, &mut |node| {
            out.push(node);
            out.len() < n
        });
        out
    }

    /// Fetches the first node matching `req`.
    fn fetch_first(&self, req: &FetchRequest) -> Option<Node> {
        self.fetch_n(req, 1).into_iter().next()
    }
}

struct WeakOutput<T> {
    target: Weak<T>,
    push: fn(&T, Change),
}

impl<T> Output for WeakOutput<T> {
    fn push(&self, change: Change) {
        if let Some(target) = self.target.upgrade() {
            (self.push)(&target, change);
        }
    }
}

/// Adapts a method of an `Rc`-held operator into an [`Output`].
///
/// The adapter holds the operator weakly, so an upstream input keeping its
/// output alive does not keep the downstream operator alive.
pub fn output_to<T: 'static>(target: &Rc<T>, push: fn(&T, Change)) -> Rc<dyn Output> {
    Rc::new(WeakOutput {
        target: Rc::downgrade(target),
        push,
    })
}

/// Holds an operator's downstream output.
#[derive(Default)]
pub struct OutputSlot {
    output: RefCell<Option<Rc<dyn Output>>>,
}

impl OutputSlot {
    pub fn set(&self, output: Rc<dyn Output>) {
        *self.output.borrow_mut() = Some(output);
    }

    pub fn is_set(&self) -> bool {
        self.output.borrow().is_some()
    }

    /// Pushes to the output.
    ///
    /// # Panics
    ///
    /// Panics if no output was wired.
    pub fn push(&self, change: Change) {
        let output = self.output.borrow().clone();
        match output {
            Some(output) => output.push(change),
            None => panic!("output not set"),
        }
    }
}
