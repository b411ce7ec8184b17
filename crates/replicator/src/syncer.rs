//! The incremental syncer: owns the replication connection lifecycle.
//!
//! `run` subscribes, feeds messages to a [`MessageProcessor`] and forwards
//! its acknowledgements upstream. Subscribe and stream failures are retried
//! with exponential backoff; the backoff resets whenever a message is
//! processed. A fatal processing error stops the syncer, and a stopped
//! syncer never reconnects.

use crate::config::SyncerConfig;
use crate::error::{ReplicatorError, Result};
use crate::message::Message;
use crate::message_processor::{MessageProcessor, ProcessorEvent};
use crate::replica_db::ReplicaDb;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// An open logical replication stream.
#[async_trait]
pub trait ReplicationStream: Send {
    /// The next `(lsn, message)`, or `None` once the stream has ended.
    ///
    /// Must be cancel safe: a dropped call must not lose a message.
    async fn next_message(&mut self) -> Option<Result<(String, Message)>>;

    /// Confirms that everything up to `lsn` is durable downstream.
    async fn acknowledge(&mut self, lsn: &str) -> Result<()>;
}

/// Opens replication streams.
#[async_trait]
pub trait ReplicationSource: Send + Sync + 'static {
    type Stream: ReplicationStream + 'static;

    async fn subscribe(
        &self,
        slot: &str,
        publications: &[String],
        protocol_version: u32,
    ) -> Result<Self::Stream>;
}

/// Exponential backoff: doubles from `initial` up to `max`.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Returns the delay to wait now and doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = delay.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

pub struct IncrementalSyncer<S: ReplicationSource, D: ReplicaDb> {
    config: SyncerConfig,
    source: S,
    db: Arc<D>,
    stop_tx: watch::Sender<bool>,
    cause: Mutex<Option<ReplicatorError>>,
}

impl<S: ReplicationSource, D: ReplicaDb> IncrementalSyncer<S, D> {
    pub fn new(config: SyncerConfig, source: S, db: Arc<D>) -> Result<Self> {
        config.validate()?;
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            source,
            db,
            stop_tx,
            cause: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SyncerConfig {
        &self.config
    }

    /// Replication slot used by this replica.
    pub fn slot_name(&self) -> String {
        format!("ripple_{}", self.config.replica_id)
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Stops the syncer. Idempotent; the first cause given is the one
    /// [`run`](Self::run) returns. Interrupts a pending retry delay.
    pub fn stop(&self, cause: Option<ReplicatorError>) {
        if let Some(err) = cause {
            let mut slot = self.cause.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        if !self.stop_tx.send_replace(true) {
            info!(replica_id = %self.config.replica_id, "stopping incremental sync");
        }
    }

    /// Runs until stopped. Returns the cause of a fatal stop.
    pub async fn run(&self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut backoff = Backoff::new(self.config.initial_backoff(), self.config.max_backoff());
        let slot = self.slot_name();
        info!(
            replica_id = %self.config.replica_id,
            publications = ?self.config.publications,
            "starting incremental sync"
        );

        while !self.is_stopped() {
            let subscribed = self
                .source
                .subscribe(&slot, &self.config.publications, self.config.protocol_version)
                .await;
            let outcome = match subscribed {
                Ok(stream) => {
                    info!(slot = %slot, "subscribed to replication stream");
                    self.consume(stream, &mut backoff, &mut stop_rx).await
                }
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => {}
                Err(err) if err.is_retryable() => {
                    warn!(error = %err, "replication connection failed");
                }
                Err(err) => {
                    error!(error = %err, "fatal replication error");
                    self.stop(Some(err));
                }
            }
            if self.is_stopped() {
                break;
            }

            let delay = backoff.next_delay();
            warn!(delay_ms = delay.as_millis() as u64, "retrying replication subscription");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => {}
            }
        }

        info!(replica_id = %self.config.replica_id, "incremental sync stopped");
        match self.cause.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn consume(
        &self,
        mut stream: S::Stream,
        backoff: &mut Backoff,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let (mut processor, mut events) = MessageProcessor::new(self.db.clone());

        let mut outcome = loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break Ok(()),
                Some(event) = events.recv() => match event {
                    ProcessorEvent::Acknowledge(lsn) => {
                        debug!(lsn = %lsn, "acknowledging");
                        if let Err(err) = stream.acknowledge(&lsn).await {
                            break Err(err);
                        }
                    }
                    ProcessorEvent::Failed(err) => break Err(err),
                },
                next = stream.next_message() => match next {
                    Some(Ok((lsn, message))) => {
                        processor.process_message(&lsn, message);
                        backoff.reset();
                    }
                    Some(Err(err)) => break Err(err),
                    None => {
                        info!("replication stream ended");
                        break Ok(());
                    }
                },
            }
        };

        // Let queued transactions finish, then acknowledge what they applied.
        processor.stop();
        processor.drain().await;
        while let Ok(event) = events.try_recv() {
            match event {
                ProcessorEvent::Acknowledge(lsn) => {
                    if let Err(err) = stream.acknowledge(&lsn).await {
                        warn!(lsn = %lsn, error = %err, "acknowledgement failed");
                        break;
                    }
                }
                ProcessorEvent::Failed(err) => {
                    if !matches!(&outcome, Err(e) if !e.is_retryable()) {
                        outcome = Err(err);
                    }
                }
            }
        }
        outcome
    }
}
