//! In-process event fan-out.
//!
//! Every subscriber gets its own copy of each event sent while it is
//! subscribed. Publishing never blocks: a subscriber that falls more than the
//! buffer capacity behind loses the oldest events and is told how many.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Multi-subscriber broadcast of `T`.
#[derive(Debug)]
pub struct Feed<T> {
    tx: broadcast::Sender<T>,
}

/// Registration on a [`Feed`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Feed<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Returns how many subscribers it was queued for; zero is not an error.
    pub fn send(&self, event: T) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> Default for Feed<T> {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next event.
    ///
    /// Returns `None` once the feed has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Subscriber fell behind, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Subscriber fell behind, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {}
}
