//! In-process fan-out topic.
//!
//! Each subscriber gets its own bounded channel. When a subscriber's queue
//! is full the newest record is dropped for that subscriber only, so a slow
//! consumer never blocks the publishing thread.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use tracing::debug;

use super::outputs::Output;

/// Named multi-subscriber topic.
pub struct Topic<T> {
    name: String,
    depth: usize,
    senders: Mutex<Vec<Sender<T>>>,
    live: Arc<AtomicUsize>,
    dropped: AtomicU64,
}

/// Receiving end of a [`Topic`]. Dropping it unsubscribes.
pub struct Subscription<T> {
    receiver: Receiver<T>,
    live: Arc<AtomicUsize>,
}

impl<T: Clone + Send> Topic<T> {
    /// Create a topic whose subscribers buffer at most `depth` records.
    pub fn new(name: impl Into<String>, depth: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            depth: depth.max(1),
            senders: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = bounded(self.depth);
        self.senders.lock().push(sender);
        self.live.fetch_add(1, Ordering::SeqCst);
        Subscription {
            receiver,
            live: Arc::clone(&self.live),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Records dropped because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Clone + Send> Output<T> for Topic<T> {
    fn has_consumers(&self) -> bool {
        self.subscriber_count() > 0
    }

    fn publish(&self, record: T) {
        let mut senders = self.senders.lock();
        senders.retain(|sender| match sender.try_send(record.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Topic '{}': subscriber queue full, record dropped", self.name);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl<T> Deref for Subscription<T> {
    type Target = Receiver<T>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
