#![allow(dead_code)]

use ripple_core::{row, DataType, Row, TableSchema, Value};
use ripple_replicator::message::{Message, Relation};
use ripple_replicator::{MemoryReplicaDb, ProcessorEvent, ReplicatorError};
use ripple_storage::{Replica, VERSION_COLUMN};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const FOO: u32 = 123;

pub fn foo_relation() -> Relation {
    Relation::new(FOO, "public", "foo", &["id"])
}

/// A replica with the replication tables and `foo (id, big, _0_version)`.
pub fn replica_db() -> Arc<MemoryReplicaDb> {
    let mut replica = Replica::with_replication_tables();
    replica
        .create_table(
            TableSchema::new("foo")
                .column("id", DataType::Int64)
                .column("big", DataType::Int64)
                .column(VERSION_COLUMN, DataType::String)
                .primary_key(&["id"])
                .unwrap(),
        )
        .unwrap();
    Arc::new(MemoryReplicaDb::new(replica))
}

pub fn insert(id: impl Into<Value>) -> Message {
    Message::Insert {
        relation: FOO,
        new: row! { "id" => id.into() },
    }
}

/// `begin`, the given changes, `commit`, all at `commit_lsn`.
pub fn transaction(commit_lsn: &str, xid: u32, changes: Vec<Message>) -> Vec<Message> {
    let mut messages = vec![Message::begin(commit_lsn, i64::from(xid), xid)];
    messages.extend(changes);
    messages.push(Message::commit(commit_lsn, commit_lsn, i64::from(xid)));
    messages
}

pub fn foo_row(id: i64, version: &str) -> Row {
    row! { "id" => id, VERSION_COLUMN => version }
}

/// Drains every event until all senders are gone.
pub async fn collect(
    mut events: mpsc::UnboundedReceiver<ProcessorEvent>,
) -> (Vec<String>, Option<ReplicatorError>) {
    let mut acks = Vec::new();
    let mut failure = None;
    while let Some(event) = events.recv().await {
        match event {
            ProcessorEvent::Acknowledge(lsn) => acks.push(lsn),
            ProcessorEvent::Failed(err) => {
                assert!(failure.is_none(), "more than one failure reported");
                failure = Some(err);
            }
        }
    }
    (acks, failure)
}
