use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::clock::Tick;

/// Buffer depth of each subscriber channel. A held tick may be up to one interval
/// stale when read.
pub const SUBSCRIBER_CAPACITY: usize = 1;

/// Outcome of fanning one tick out to the subscriber set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub skipped: usize,
}

impl Delivery {
    pub fn missed_any(&self) -> bool {
        self.skipped > 0
    }
}

struct Inner {
    senders: Vec<mpsc::Sender<Tick>>,
    sealed: bool,
}

/// Thread-safe, append-only subscriber list
pub struct SubscriberSet {
    inner: Mutex<Inner>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                senders: Vec::new(),
                sealed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber and hand back its receiving end
    pub fn subscribe(&self) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let mut inner = self.lock();
        inner.senders.push(tx);
        tracing::debug!("Subscriber added. Total: {}", inner.senders.len());
        rx
    }

    /// Offer a tick to every subscriber without waiting on any of them.
    ///
    /// Full or abandoned channels are skipped for this tick and stay registered.
    pub fn broadcast(&self, tick: Tick) -> Delivery {
        let inner = self.lock();
        let mut delivery = Delivery::default();
        if inner.sealed {
            return delivery;
        }

        for tx in &inner.senders {
            match tx.try_send(tick) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    delivery.skipped += 1;
                }
            }
        }

        delivery
    }

    /// Stop all further fan-out. Channels are left open.
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Get current subscriber count
    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriberSet {
    fn default() -> Self {
        Self::new()
    }
}
