//! Demultiplexes a replication stream into per-transaction processing.
//!
//! Assembly happens synchronously as messages arrive. Each committed
//! transaction is then applied by its own task, and the tasks commit in
//! assembly order through a [`TxSerializer`]. Results come back as
//! [`ProcessorEvent`]s: an acknowledgement per applied transaction, or the
//! failure that ends processing. Once a transaction fails, every
//! transaction queued behind it is dropped.

use crate::error::{ReplicatorError, Result};
use crate::message::{Message, Relation, RelationId, ReplicaIdentity};
use crate::replica_db::ReplicaDb;
use crate::serializer::{Ticket, TxSerializer};
use crate::transaction_processor::TransactionProcessor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Outcome of processing one queued transaction.
#[derive(Debug)]
pub enum ProcessorEvent {
    /// The transaction committed at this LSN is durable in the replica.
    Acknowledge(String),
    /// Processing failed; nothing after this will be applied.
    Failed(ReplicatorError),
}

enum Work {
    Apply(TransactionProcessor),
    Fail(ReplicatorError),
}

struct InFlight {
    tx: TransactionProcessor,
    ticket: Ticket,
}

pub struct MessageProcessor<D: ReplicaDb> {
    db: Arc<D>,
    serializer: TxSerializer,
    relations: HashMap<RelationId, Relation>,
    current: Option<InFlight>,
    failed: Arc<AtomicBool>,
    /// Set once a failure has been queued or the processor was stopped.
    refusing: bool,
    events: mpsc::UnboundedSender<ProcessorEvent>,
    /// Transaction tasks not yet reaped. Dropping the processor aborts
    /// them, so callers `drain` first.
    tasks: JoinSet<()>,
}

impl<D: ReplicaDb> MessageProcessor<D> {
    /// Creates a processor and the receiver for its events.
    pub fn new(db: Arc<D>) -> (Self, mpsc::UnboundedReceiver<ProcessorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let processor = Self {
            db,
            serializer: TxSerializer::new(),
            relations: HashMap::new(),
            current: None,
            failed: Arc::new(AtomicBool::new(false)),
            refusing: false,
            events,
            tasks: JoinSet::new(),
        };
        (processor, rx)
    }

    /// Whether a transaction has failed or the processor was stopped.
    pub fn is_refusing(&self) -> bool {
        self.refusing || self.failed.load(Ordering::SeqCst)
    }

    /// Feeds one message.
    ///
    /// Must be called from within a tokio runtime. Errors are never
    /// returned directly: a fatal condition is queued behind the
    /// transactions already assembled and surfaces as
    /// [`ProcessorEvent::Failed`].
    pub fn process_message(&mut self, lsn: &str, message: Message) {
        if self.is_refusing() {
            debug!(lsn, tag = message.tag(), "processor refusing message");
            return;
        }
        if let Err(err) = self.dispatch(lsn, message) {
            self.fail(err);
        }
    }

    fn dispatch(&mut self, lsn: &str, message: Message) -> Result<()> {
        match message {
            Message::Begin {
                commit_lsn,
                commit_time,
                xid,
            } => {
                if let Some(current) = &self.current {
                    return Err(ReplicatorError::ProtocolViolation(format!(
                        "begin for {} at {} while transaction {} is open",
                        commit_lsn,
                        lsn,
                        current.tx.commit_lsn()
                    )));
                }
                let tx = TransactionProcessor::begin(&commit_lsn, commit_time, xid)?;
                debug!(
                    lsn = %commit_lsn,
                    xid,
                    state_version = tx.state_version(),
                    "begin transaction"
                );
                let ticket = self.serializer.enqueue();
                self.current = Some(InFlight { tx, ticket });
                Ok(())
            }
            Message::Relation(relation) => {
                if relation.replica_identity != ReplicaIdentity::Default {
                    return Err(ReplicatorError::UnsupportedReplicaIdentity {
                        table: relation.table_name(),
                        identity: relation.replica_identity.to_string(),
                    });
                }
                debug!(table = %relation.table_name(), keys = ?relation.key_columns, "relation");
                self.relations.insert(relation.id, relation);
                Ok(())
            }
            Message::Insert { relation, new } => {
                let relation = self.relation(relation)?;
                self.open_tx("insert")?.process_insert(&relation, new)
            }
            Message::Update { relation, key, new } => {
                let relation = self.relation(relation)?;
                self.open_tx("update")?.process_update(&relation, key, new)
            }
            Message::Delete { relation, key } => {
                let relation = self.relation(relation)?;
                self.open_tx("delete")?.process_delete(&relation, key)
            }
            Message::Truncate { relations, .. } => {
                let relations = relations
                    .into_iter()
                    .map(|id| self.relation(id))
                    .collect::<Result<Vec<_>>>()?;
                self.open_tx("truncate")?.process_truncate(&relations)
            }
            Message::Commit { commit_lsn, .. } => {
                let current = self.current.take().ok_or_else(|| {
                    ReplicatorError::ProtocolViolation(format!(
                        "commit for {} outside of a transaction",
                        commit_lsn
                    ))
                })?;
                if current.tx.commit_lsn() != commit_lsn {
                    let expected = current.tx.commit_lsn().to_string();
                    self.current = Some(current);
                    return Err(ReplicatorError::ProtocolViolation(format!(
                        "commit for {} does not match begin for {}",
                        commit_lsn, expected
                    )));
                }
                debug!(lsn = %commit_lsn, xid = current.tx.xid(), "commit transaction");
                self.spawn(current.ticket, Work::Apply(current.tx));
                Ok(())
            }
            Message::Origin { name, .. } => {
                debug!(lsn, origin = %name, "ignoring origin message");
                Ok(())
            }
            Message::LogicalMessage { prefix, .. } => {
                debug!(lsn, prefix = %prefix, "ignoring logical decoding message");
                Ok(())
            }
            Message::Type { schema, name, .. } => Err(ReplicatorError::UnsupportedType(
                format!("{}.{}", schema, name),
            )),
            Message::Unknown { tag } => Err(ReplicatorError::UnknownMessage(tag)),
        }
    }

    fn relation(&self, id: RelationId) -> Result<Relation> {
        self.relations.get(&id).cloned().ok_or_else(|| {
            ReplicatorError::ProtocolViolation(format!("change for unknown relation {}", id))
        })
    }

    fn open_tx(&mut self, tag: &str) -> Result<&mut TransactionProcessor> {
        match &mut self.current {
            Some(current) => Ok(&mut current.tx),
            None => Err(ReplicatorError::ProtocolViolation(format!(
                "{} outside of a transaction",
                tag
            ))),
        }
    }

    /// Queues `err` behind every transaction assembled so far and refuses
    /// further messages.
    fn fail(&mut self, err: ReplicatorError) {
        self.refusing = true;
        match self.current.take() {
            Some(mut current) => {
                current.tx.fail(err);
                self.spawn(current.ticket, Work::Apply(current.tx));
            }
            None => {
                let ticket = self.serializer.enqueue();
                self.spawn(ticket, Work::Fail(err));
            }
        }
    }

    fn spawn(&mut self, ticket: Ticket, work: Work) {
        let db = self.db.clone();
        let failed = self.failed.clone();
        let events = self.events.clone();
        self.reap();
        self.tasks.spawn(async move {
            let _turn = ticket.acquire().await;
            if failed.load(Ordering::SeqCst) {
                return;
            }
            let result = match work {
                Work::Fail(err) => Err(err),
                Work::Apply(tx) => apply(db.as_ref(), tx).await,
            };
            let event = match result {
                Ok(lsn) => ProcessorEvent::Acknowledge(lsn),
                Err(err) => {
                    failed.store(true, Ordering::SeqCst);
                    error!(error = %err, "transaction processing failed");
                    ProcessorEvent::Failed(err)
                }
            };
            // The receiver is gone only when nobody is waiting on outcomes.
            let _ = events.send(event);
        });
    }

    /// Drops the handles of finished tasks.
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "transaction task panicked");
            }
        }
    }

    /// Number of transaction tasks spawned and not yet reaped.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Stops accepting messages. Transactions already committed to the
    /// stream keep processing; a transaction still being assembled is
    /// dropped. It is the last ticket taken, so nothing waits on it.
    pub fn stop(&mut self) {
        self.refusing = true;
        if let Some(current) = self.current.take() {
            debug!(lsn = current.tx.commit_lsn(), "dropping unfinished transaction");
        }
    }

    /// Waits for every queued transaction to finish.
    pub async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "transaction task panicked");
            }
        }
    }
}

async fn apply<D: ReplicaDb>(db: &D, tx: TransactionProcessor) -> Result<String> {
    let lsn = tx.commit_lsn().to_string();
    let state_version = tx.state_version().to_string();
    let xid = tx.xid();
    let batch = tx.into_batch()?;
    match db.execute(batch).await {
        Ok(rows) => {
            debug!(lsn = %lsn, xid, state_version = %state_version, rows, "applied transaction");
            Ok(lsn)
        }
        Err(e) => {
            let err = ReplicatorError::from(e);
            if err.is_benign_replay() {
                debug!(lsn = %lsn, state_version = %state_version, "transaction already applied");
                Ok(lsn)
            } else {
                Err(err)
            }
        }
    }
}
