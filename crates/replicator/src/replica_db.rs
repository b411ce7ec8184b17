//! The downstream store transactions are applied to.

use async_trait::async_trait;
use ripple_core::{Result, Row};
use ripple_storage::{Replica, Statement};
use std::sync::{Arc, Mutex, MutexGuard};

/// A transactional store that applies a batch of statements atomically.
#[async_trait]
pub trait ReplicaDb: Send + Sync + 'static {
    /// Executes `batch` in one transaction, returning the rows written.
    ///
    /// On error nothing from the batch is visible.
    async fn execute(&self, batch: Vec<Statement>) -> Result<usize>;
}

/// A [`ReplicaDb`] over an in-memory [`Replica`].
#[derive(Clone, Default)]
pub struct MemoryReplicaDb {
    replica: Arc<Mutex<Replica>>,
}

impl MemoryReplicaDb {
    pub fn new(replica: Replica) -> Self {
        Self {
            replica: Arc::new(Mutex::new(replica)),
        }
    }

    /// Locks the replica for inspection or setup.
    pub fn lock(&self) -> MutexGuard<'_, Replica> {
        self.replica.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A copy of every row of `table` in key order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        self.lock().rows(table)
    }
}

#[async_trait]
impl ReplicaDb for MemoryReplicaDb {
    async fn execute(&self, batch: Vec<Statement>) -> Result<usize> {
        self.lock().execute(&batch)
    }
}
