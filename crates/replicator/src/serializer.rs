//! Commit ordering for transactions processed concurrently with assembly.
//!
//! Each transaction takes a [`Ticket`] when its `begin` is assembled.
//! Tickets are granted in the order they were taken, regardless of the
//! order in which the processing tasks get around to waiting on them.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Hands out tickets in assembly order.
#[derive(Clone, Default)]
pub struct TxSerializer {
    tail: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
}

/// A reserved place in the commit order.
///
/// Every ticket must eventually be [`acquire`](Ticket::acquire)d, or the
/// tickets behind it are released early.
#[must_use = "tickets behind this one wait until it is acquired and released"]
pub struct Ticket {
    prev: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

/// Exclusive turn on the serializer; the next ticket is granted on drop.
pub struct Turn {
    _done: oneshot::Sender<()>,
}

impl TxSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the next ticket. Never blocks.
    pub fn enqueue(&self) -> Ticket {
        let (done, next) = oneshot::channel();
        let mut tail = self.tail.lock().unwrap_or_else(|e| e.into_inner());
        let prev = tail.replace(next);
        Ticket { prev, done }
    }
}

impl Ticket {
    /// Waits until every earlier ticket's turn has ended.
    pub async fn acquire(self) -> Turn {
        if let Some(prev) = self.prev {
            // A dropped sender also ends the previous turn.
            let _ = prev.await;
        }
        Turn { _done: self.done }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_turns_follow_enqueue_order() {
        let serializer = TxSerializer::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let tickets: Vec<Ticket> = (0..4).map(|_| serializer.enqueue()).collect();
        let mut handles = Vec::new();
        // Spawn in reverse so the later tickets start waiting first.
        for (i, ticket) in tickets.into_iter().enumerate().rev() {
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _turn = ticket.acquire().await;
                tokio::time::sleep(Duration::from_millis(1)).await;
                order.lock().unwrap().push(i);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_first_ticket_is_granted_immediately() {
        let serializer = TxSerializer::new();
        let first = serializer.enqueue();
        let second = serializer.enqueue();
        let turn = first.acquire().await;
        let waiting = tokio::spawn(second.acquire());
        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());
        drop(turn);
        waiting.await.unwrap();
    }
}
