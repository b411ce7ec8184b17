//! Logical replication messages (pgoutput protocol version 1).
//!
//! Decoding the wire format is the stream's job; the processor consumes
//! these already-decoded messages.

use ripple_core::Row;
use std::fmt;

/// Relation OID as sent by the upstream.
pub type RelationId = u32;

/// REPLICA IDENTITY setting of a published table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaIdentity {
    /// Key columns identify the old row.
    Default,
    Nothing,
    /// Every column identifies the old row.
    Full,
    Index,
}

impl fmt::Display for ReplicaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReplicaIdentity::Default => "default",
            ReplicaIdentity::Nothing => "nothing",
            ReplicaIdentity::Full => "full",
            ReplicaIdentity::Index => "index",
        };
        f.write_str(s)
    }
}

/// A published table as described by a `relation` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub id: RelationId,
    pub schema: String,
    pub name: String,
    pub replica_identity: ReplicaIdentity,
    pub columns: Vec<String>,
    pub key_columns: Vec<String>,
}

impl Relation {
    pub fn new<S: AsRef<str>>(id: RelationId, schema: &str, name: &str, key_columns: &[S]) -> Self {
        let key_columns: Vec<String> = key_columns.iter().map(|c| c.as_ref().to_string()).collect();
        Self {
            id,
            schema: schema.to_string(),
            name: name.to_string(),
            replica_identity: ReplicaIdentity::Default,
            columns: key_columns.clone(),
            key_columns,
        }
    }

    pub fn with_identity(mut self, identity: ReplicaIdentity) -> Self {
        self.replica_identity = identity;
        self
    }

    /// Name of the replica table: bare for `public`, schema-qualified
    /// otherwise.
    pub fn table_name(&self) -> String {
        if self.schema == "public" {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }
}

/// One decoded replication message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Begin {
        commit_lsn: String,
        /// Microseconds since the Postgres epoch.
        commit_time: i64,
        xid: u32,
    },
    Commit {
        flags: u8,
        commit_lsn: String,
        commit_end_lsn: String,
        commit_time: i64,
    },
    Relation(Relation),
    Insert {
        relation: RelationId,
        new: Row,
    },
    /// `key` carries the old key columns when the update changed the key.
    Update {
        relation: RelationId,
        key: Option<Row>,
        new: Row,
    },
    Delete {
        relation: RelationId,
        key: Row,
    },
    Truncate {
        relations: Vec<RelationId>,
        cascade: bool,
        restart_identity: bool,
    },
    Origin {
        origin_lsn: String,
        name: String,
    },
    Type {
        id: u32,
        schema: String,
        name: String,
    },
    /// A logical decoding message (`pg_logical_emit_message`).
    LogicalMessage {
        transactional: bool,
        prefix: String,
        content: Vec<u8>,
    },
    /// A tag this crate does not decode.
    Unknown {
        tag: String,
    },
}

impl Message {
    /// The pgoutput tag of this message.
    pub fn tag(&self) -> &str {
        match self {
            Message::Begin { .. } => "begin",
            Message::Commit { .. } => "commit",
            Message::Relation(_) => "relation",
            Message::Insert { .. } => "insert",
            Message::Update { .. } => "update",
            Message::Delete { .. } => "delete",
            Message::Truncate { .. } => "truncate",
            Message::Origin { .. } => "origin",
            Message::Type { .. } => "type",
            Message::LogicalMessage { .. } => "message",
            Message::Unknown { tag } => tag,
        }
    }

    pub fn begin(commit_lsn: &str, commit_time: i64, xid: u32) -> Self {
        Message::Begin {
            commit_lsn: commit_lsn.to_string(),
            commit_time,
            xid,
        }
    }

    pub fn commit(commit_lsn: &str, commit_end_lsn: &str, commit_time: i64) -> Self {
        Message::Commit {
            flags: 0,
            commit_lsn: commit_lsn.to_string(),
            commit_end_lsn: commit_end_lsn.to_string(),
            commit_time,
        }
    }
}
