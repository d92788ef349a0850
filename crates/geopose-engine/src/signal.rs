//! Per-frame replay-last signals.
//!
//! Each frame name with at least one stream subscriber owns a
//! [`tokio::sync::watch`] channel carrying the engine commit sequence.
//! A watch channel is exactly the "latch" the reactive layer needs: it
//! stores the latest tick, wakes all subscribers, and coalesces bursts
//! (a slow subscriber sees only the newest tick, which is the documented
//! delivery policy). Dropping the sender is the terminal completion that
//! tells streams their frame has been removed.
//!
//! Subscriptions are handed out as [`SignalSubscription`] guards: dropping
//! the last guard for a name releases the registry entry immediately.
//! Entries carry an epoch so a guard that outlived a remove/re-subscribe
//! cycle can never tear down a successor channel for the same name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

#[derive(Debug)]
struct Entry {
    epoch: u64,
    sender: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct Entries {
    signals: HashMap<String, Entry>,
    next_epoch: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SignalRegistry {
    inner: Arc<Mutex<Entries>>,
}

impl SignalRegistry {
    /// Subscribes to the signal for `name`, creating it on first use. The
    /// frame does not have to exist yet; a later `create` will tick the
    /// signal.
    pub fn subscribe(&self, name: &str) -> SignalSubscription {
        let mut entries = lock(&self.inner);
        let (epoch, receiver) = match entries.signals.get(name) {
            Some(entry) => (entry.epoch, entry.sender.subscribe()),
            None => {
                let (sender, receiver) = watch::channel(0);
                let epoch = entries.next_epoch;
                entries.next_epoch += 1;
                entries
                    .signals
                    .insert(name.to_string(), Entry { epoch, sender });
                (epoch, receiver)
            }
        };
        SignalSubscription {
            receiver,
            name: name.to_string(),
            epoch,
            inner: self.inner.clone(),
        }
    }

    /// Ticks the signals of every named frame with the commit sequence.
    pub fn notify<'a>(&self, names: impl IntoIterator<Item = &'a str>, sequence: u64) {
        let entries = lock(&self.inner);
        for name in names {
            if let Some(entry) = entries.signals.get(name) {
                let _ = entry.sender.send(sequence);
            }
        }
    }

    /// Completes the signal for a removed frame: subscribers observe the
    /// end of the stream.
    pub fn complete(&self, name: &str) {
        lock(&self.inner).signals.remove(name);
    }

    /// Number of live signals (test hook).
    #[cfg(test)]
    pub fn len(&self) -> usize {
        lock(&self.inner).signals.len()
    }
}

/// One subscriber's handle on a per-frame signal.
///
/// Dropping the handle releases its registry slot: when the last handle
/// for a frame name goes away, the whole entry (and its channel) is
/// removed at that moment.
#[derive(Debug)]
pub(crate) struct SignalSubscription {
    receiver: watch::Receiver<u64>,
    name: String,
    epoch: u64,
    inner: Arc<Mutex<Entries>>,
}

impl SignalSubscription {
    /// Waits until the signal ticks past the last seen value. `Err` is the
    /// terminal completion (the frame was removed).
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }

    /// The last tick value (test hook).
    #[cfg(test)]
    pub fn latest(&self) -> u64 {
        *self.receiver.borrow()
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        let mut entries = lock(&self.inner);
        // Our receiver is still alive here, so a count of one means no
        // other subscriber remains. The epoch check keeps a stale guard
        // from tearing down a successor channel for the same name.
        let last = entries
            .signals
            .get(&self.name)
            .is_some_and(|entry| entry.epoch == self.epoch && entry.sender.receiver_count() <= 1);
        if last {
            entries.signals.remove(&self.name);
        }
    }
}

fn lock(inner: &Arc<Mutex<Entries>>) -> MutexGuard<'_, Entries> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
