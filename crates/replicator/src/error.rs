//! Error types for the replicator.
//!
//! Every failure on the ingestion path is a [`ReplicatorError`]. The syncer
//! uses [`ReplicatorError::is_retryable`] to decide between reconnecting with
//! backoff and stopping for good.
//!
//! # Error Classification
//!
//! - **Protocol**: message ordering violations, unsupported replica
//!   identity, unknown tags, custom types. Fatal.
//! - **Execution**: any storage failure while applying a transaction.
//!   Fatal, except the benign replay of a transaction already in the TxLog.
//! - **Connection**: subscribe or stream failures. Retried with backoff.
//! - **Configuration**: rejected before the syncer starts.

use ripple_storage::{UniqueConstraint, TX_LOG};

/// Primary error type for the replicator.
#[derive(Debug, thiserror::Error)]
pub enum ReplicatorError {
    // ── Protocol errors: fatal ──────────────────────────────────────────
    /// A message arrived out of order (e.g. a change outside a transaction).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A relation was published with a replica identity other than DEFAULT.
    #[error("unsupported REPLICA IDENTITY {identity} for table {table}")]
    UnsupportedReplicaIdentity { table: String, identity: String },

    /// A custom type message; custom types are not supported.
    #[error("custom types are not supported: {0}")]
    UnsupportedType(String),

    /// A message tag the processor does not know.
    #[error("unknown message tag: {0}")]
    UnknownMessage(String),

    /// An LSN that is not of the form `X/Y`.
    #[error("invalid LSN: {0}")]
    InvalidLsn(String),

    // ── Execution errors ─────────────────────────────────────────────────
    /// The replica rejected a transaction.
    #[error("storage error: {0}")]
    Storage(ripple_core::Error),

    /// A row could not be serialized for the change log.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Connection errors: retry with backoff ───────────────────────────
    /// Subscribing to the replication stream failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// The replication stream failed mid-flight.
    #[error("replication stream error: {0}")]
    Stream(String),

    // ── Lifecycle ────────────────────────────────────────────────────────
    /// The processor or syncer was stopped and refuses new work.
    #[error("replicator stopped")]
    Stopped,

    // ── Configuration errors ─────────────────────────────────────────────
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ripple_core::Error> for ReplicatorError {
    fn from(e: ripple_core::Error) -> Self {
        ReplicatorError::Storage(e)
    }
}

impl ReplicatorError {
    /// Whether the syncer should reconnect after this error.
    ///
    /// Only connection errors are retryable. Protocol and execution errors
    /// need operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReplicatorError::Subscribe(_) | ReplicatorError::Stream(_)
        )
    }

    /// Whether this error means the transaction was already applied.
    ///
    /// A unique violation on the TxLog primary key is what a replay of a
    /// committed transaction (e.g. after a reconnect that lost the
    /// acknowledgement) looks like.
    pub fn is_benign_replay(&self) -> bool {
        match self {
            ReplicatorError::Storage(ripple_core::Error::UniqueViolation { table, constraint }) => {
                table == TX_LOG && *constraint == UniqueConstraint::primary_key_name(TX_LOG)
            }
            _ => false,
        }
    }
}

/// Result alias for replicator operations.
pub type Result<T> = std::result::Result<T, ReplicatorError>;
