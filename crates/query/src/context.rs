//! Builder context: where pipeline construction gets its sources and
//! operator storage.

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;
use hashbrown::HashMap;
use ripple_incremental::{MemorySource, Storage};

/// Supplies sources and storage to [`build_pipeline`](crate::build_pipeline).
///
/// A context is passed to each build; there is no global registry.
pub trait BuilderContext {
    /// Returns the source for `table`, if there is one.
    ///
    /// May be called more than once for the same table; returning the same
    /// source each time is expected.
    fn get_source(&self, table: &str) -> Option<MemorySource>;

    /// Creates a fresh, empty storage for one operator.
    fn create_storage<V: Clone>(&self) -> Storage<V> {
        Storage::new()
    }
}

/// A context backed by a fixed set of in-memory sources.
#[derive(Clone, Default)]
pub struct MemoryContext {
    sources: HashMap<String, MemorySource>,
    storages_created: Cell<usize>,
}

impl MemoryContext {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under its table name.
    pub fn register(&mut self, source: MemorySource) {
        self.sources.insert(source.table().name().into(), source);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_source(mut self, source: MemorySource) -> Self {
        self.register(source);
        self
    }

    /// Returns the registered table names, sorted.
    pub fn tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of storages handed out so far.
    pub fn storages_created(&self) -> usize {
        self.storages_created.get()
    }
}

impl BuilderContext for MemoryContext {
    fn get_source(&self, table: &str) -> Option<MemorySource> {
        self.sources.get(table).cloned()
    }

    fn create_storage<V: Clone>(&self) -> Storage<V> {
        self.storages_created.set(self.storages_created.get() + 1);
        Storage::new()
    }
}
