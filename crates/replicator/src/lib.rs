//! Ripple Replicator - logical replication ingestion into the replica.
//!
//! Upstream WAL flows through this crate as:
//!
//! - `syncer`: subscribes, retries with backoff, forwards acknowledgements
//! - `message_processor`: splits the stream into transactions
//! - `transaction_processor`: turns one transaction into a replica batch
//!   (TxLog row, table writes, compacted ChangeLog entries)
//! - `serializer`: makes batches commit in upstream order
//! - `replica_db`: the downstream store
//!
//! # Example
//!
//! ```
//! use ripple_core::row;
//! use ripple_replicator::message::Relation;
//! use ripple_replicator::TransactionProcessor;
//!
//! let foo = Relation::new(1, "public", "foo", &["id"]);
//! let mut tx = TransactionProcessor::begin("0/e", 0, 1).unwrap();
//! tx.process_insert(&foo, row! { "id" => 1 }).unwrap();
//! assert_eq!(tx.state_version(), "0e");
//! // TxLog insert, ChangeLog upsert, table insert.
//! assert_eq!(tx.into_batch().unwrap().len(), 3);
//! ```

pub mod config;
pub mod error;
pub mod lexi_version;
pub mod message;
pub mod message_processor;
pub mod replica_db;
pub mod row_key;
pub mod serializer;
pub mod syncer;
pub mod transaction_processor;

pub use config::SyncerConfig;
pub use error::{ReplicatorError, Result};
pub use message::{Message, Relation, ReplicaIdentity};
pub use message_processor::{MessageProcessor, ProcessorEvent};
pub use replica_db::{MemoryReplicaDb, ReplicaDb};
pub use syncer::{Backoff, IncrementalSyncer, ReplicationSource, ReplicationStream};
pub use transaction_processor::TransactionProcessor;
