//! Broadcast bus for forest changes.
//!
//! Built on [`tokio::sync::broadcast`] so every subscriber receives every
//! change without any single subscriber blocking the others. Subscriptions
//! are replay-seeded: the engine snapshots the forest under its write lock
//! and synthesizes one `Created` per live frame in pre-order before any
//! live event, which makes a fresh stream equivalent to "enumerate the
//! world, then follow it".

use std::collections::VecDeque;

use geopose_types::Change;
use tokio::sync::broadcast;

/// Buffered changes per subscriber before the oldest are dropped for a
/// slow consumer.
const DEFAULT_CAPACITY: usize = 256;

/// Producer side of the change stream. Cheap to clone; all clones share
/// the underlying channel.
#[derive(Clone, Debug)]
pub(crate) struct ChangeBus {
    sender: broadcast::Sender<Change>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a change to all active subscribers. A send with no
    /// subscribers is not an error; the change is simply unobserved.
    pub fn publish(&self, change: Change) {
        let _ = self.sender.send(change);
    }

    /// Subscribes with the given replayed prefix. The caller must hold the
    /// engine write lock while snapshotting the seed and calling this, so
    /// that no commit lands between the seed and the live subscription.
    pub fn subscribe_seeded(&self, seed: Vec<Change>) -> ChangeStream {
        ChangeStream {
            seeded: VecDeque::from(seed),
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Consumer side of the change stream.
///
/// Backpressure policy: each subscriber rides a bounded ring of
/// [`DEFAULT_CAPACITY`] changes with drop-oldest semantics. A subscriber
/// that falls behind skips the dropped changes (logged at `warn`) and
/// resumes with the oldest retained one; commit order is otherwise
/// preserved.
pub struct ChangeStream {
    seeded: VecDeque<Change>,
    receiver: broadcast::Receiver<Change>,
}

impl ChangeStream {
    /// Waits for the next change.
    ///
    /// Returns `None` once the engine (the producer side) has gone away
    /// and every buffered change has been delivered.
    pub async fn recv(&mut self) -> Option<Change> {
        if let Some(change) = self.seeded.pop_front() {
            return Some(change);
        }
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change stream subscriber lagged; dropping oldest");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopose_types::Frame;

    fn created(name: &str, generation: u64) -> Change {
        Change::Created(Frame {
            name: name.to_string(),
            parent: Some("ECEF".to_string()),
            pose: None,
            generation,
        })
    }

    #[tokio::test]
    async fn seeded_prefix_comes_before_live_events() {
        let bus = ChangeBus::default();
        let mut stream = bus.subscribe_seeded(vec![created("a", 1), created("b", 2)]);
        bus.publish(created("c", 3));

        assert_eq!(stream.recv().await.unwrap().name(), "a");
        assert_eq!(stream.recv().await.unwrap().name(), "b");
        assert_eq!(stream.recv().await.unwrap().name(), "c");
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_change() {
        let bus = ChangeBus::default();
        let mut first = bus.subscribe_seeded(Vec::new());
        let mut second = bus.subscribe_seeded(Vec::new());
        bus.publish(Change::Removed {
            name: "gone".to_string(),
        });

        assert_eq!(first.recv().await.unwrap().name(), "gone");
        assert_eq!(second.recv().await.unwrap().name(), "gone");
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_to_oldest_retained() {
        let bus = ChangeBus::new(2);
        let mut stream = bus.subscribe_seeded(Vec::new());
        for generation in 0..5 {
            bus.publish(created("x", generation));
        }
        // Ring of 2: generations 3 and 4 survive.
        let first = stream.recv().await.unwrap();
        match first {
            Change::Created(frame) => assert_eq!(frame.generation, 3),
            Change::Removed { .. } => panic!("unexpected variant"),
        }
    }

    #[tokio::test]
    async fn stream_ends_when_the_producer_is_dropped() {
        let bus = ChangeBus::default();
        let mut stream = bus.subscribe_seeded(vec![created("last", 1)]);
        drop(bus);
        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_none());
    }
}
