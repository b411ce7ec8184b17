//! Materialized views over an operator pipeline.
//!
//! An [`ArrayView`] hydrates its input once, then applies every pushed change
//! to an in-memory tree of [`Entry`]s. Listeners are only told about changes
//! at [`flush`](ArrayView::flush) boundaries, so a burst of pushes produces a
//! single notification.

use crate::apply::apply_change;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{Error, Result, Row};
use ripple_incremental::{output_to, Change, FetchRequest, Input, SourceSchema};

/// Shape of a view level: a list of entries, or at most one entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Format {
    pub singular: bool,
    pub relationships: BTreeMap<String, Format>,
}

impl Format {
    /// A list level.
    pub fn list() -> Self {
        Self::default()
    }

    /// A level holding at most one entry.
    pub fn singular() -> Self {
        Self {
            singular: true,
            relationships: BTreeMap::new(),
        }
    }

    /// Sets the format of relationship `name`.
    pub fn with(mut self, name: impl Into<String>, format: Format) -> Self {
        self.relationships.insert(name.into(), format);
        self
    }

    /// Format of relationship `name`. Unlisted relationships are lists.
    pub fn child(&self, name: &str) -> Format {
        self.relationships.get(name).cloned().unwrap_or_default()
    }
}

/// One materialized row with its relationship views.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub row: Row,
    pub relationships: BTreeMap<String, View>,
}

impl Entry {
    pub fn relationship(&self, name: &str) -> Option<&View> {
        self.relationships.get(name)
    }
}

/// The contents of one view level.
#[derive(Clone, Debug, PartialEq)]
pub enum View {
    List(Vec<Entry>),
    Single(Option<Entry>),
}

impl View {
    /// An empty level of the given format.
    pub fn empty(format: &Format) -> Self {
        if format.singular {
            View::Single(None)
        } else {
            View::List(Vec::new())
        }
    }

    /// The entries at this level, in order.
    pub fn entries(&self) -> &[Entry] {
        match self {
            View::List(list) => list,
            View::Single(Some(entry)) => core::slice::from_ref(entry),
            View::Single(None) => &[],
        }
    }

    /// The rows at this level, in order.
    pub fn rows(&self) -> Vec<Row> {
        self.entries().iter().map(|e| e.row.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

struct ViewState {
    root: View,
    hydrated: bool,
    dirty: bool,
}

/// A listener-driven materialization of a pipeline's output.
pub struct ArrayView {
    input: Rc<dyn Input>,
    schema: SourceSchema,
    format: Format,
    state: RefCell<ViewState>,
    listeners: RefCell<SubscriptionManager<View>>,
    on_destroy: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl ArrayView {
    /// Creates a view over `input` and registers it as the input's output.
    ///
    /// # Panics
    ///
    /// Panics if the input's ordering does not include every primary key
    /// column.
    pub fn new(input: Rc<dyn Input>, format: Format) -> Rc<Self> {
        let schema = input.schema().clone();
        for column in &schema.primary_key {
            assert!(
                schema.sort.mentions(column),
                "ordering must include primary key column {column}"
            );
        }
        let root = View::empty(&format);
        let view = Rc::new(Self {
            input,
            schema,
            format,
            state: RefCell::new(ViewState {
                root,
                hydrated: false,
                dirty: false,
            }),
            listeners: RefCell::new(SubscriptionManager::new()),
            on_destroy: RefCell::new(None),
        });
        view.input.set_output(output_to(&view, ArrayView::push));
        view
    }

    /// Reads the current data.
    pub fn data(&self) -> View {
        self.state.borrow().root.clone()
    }

    /// Calls `f` with the current data without copying it.
    pub fn with_data<R>(&self, f: impl FnOnce(&View) -> R) -> R {
        f(&self.state.borrow().root)
    }

    pub fn is_hydrated(&self) -> bool {
        self.state.borrow().hydrated
    }

    /// Registers `listener`. If the view is already hydrated the listener is
    /// called right away with the current data.
    pub fn add_listener<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&View) + 'static,
    {
        let id = self.listeners.borrow_mut().subscribe(listener);
        if self.is_hydrated() {
            let listener = self.listeners.borrow().get(id);
            if let Some(listener) = listener {
                listener(&self.data());
            }
        }
        id
    }

    /// Returns true if the listener was registered.
    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.listeners.borrow_mut().unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Sets a callback run once by [`destroy`](Self::destroy).
    pub fn on_destroy(&self, callback: impl FnOnce() + 'static) {
        *self.on_destroy.borrow_mut() = Some(Box::new(callback));
    }

    /// Hydrates the input and notifies listeners.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOperation` if the view is already hydrated.
    pub fn hydrate(&self) -> Result<()> {
        if self.is_hydrated() {
            return Err(Error::invalid_operation("view is already hydrated"));
        }
        let nodes = self.input.hydrate(&FetchRequest::all());
        {
            let mut state = self.state.borrow_mut();
            state.hydrated = true;
            state.dirty = true;
            for node in nodes {
                apply_change(&mut state.root, Change::Add(node), &self.schema, &self.format);
            }
        }
        self.flush();
        Ok(())
    }

    fn push(&self, change: Change) {
        let mut state = self.state.borrow_mut();
        state.dirty = true;
        apply_change(&mut state.root, change, &self.schema, &self.format);
    }

    /// Notifies listeners if anything changed since the last flush.
    pub fn flush(&self) {
        {
            let mut state = self.state.borrow_mut();
            if !state.dirty {
                return;
            }
            state.dirty = false;
        }
        let data = self.data();
        let listeners = self.listeners.borrow().listeners();
        for listener in listeners {
            listener(&data);
        }
    }

    /// Releases the pipeline behind this view.
    pub fn destroy(&self) {
        if self.is_hydrated() {
            self.input.cleanup(&FetchRequest::all());
            self.state.borrow_mut().hydrated = false;
        }
        self.input.destroy();
        if let Some(callback) = self.on_destroy.borrow_mut().take() {
            callback();
        }
    }
}
