//! Identity-deduplicating FIFO queue.
//!
//! [`DedupQueue`] sits between the webhook handlers (producers) and the alert
//! workers (consumers). Adding a key that is already waiting replaces its
//! payload in place: the key keeps the position of its *first* arrival and
//! carries the *latest* payload. Repeated reports of the same gym or spawn
//! therefore produce one alert with the freshest data.
//!
//! ## Concurrency
//!
//! The order (`VecDeque<K>`) and the payload map (`HashMap<K, V>`) live behind
//! one [`std::sync::Mutex`] and are always updated together, so no observer can
//! see a key in the order without its payload or the reverse. The lock is
//! never held across an `.await`. Consumers park on a [`tokio::sync::Notify`]
//! that every new key signals.
//!
//! The queue is an in-process primitive: producers and consumers are tasks or
//! threads of one process sharing it through an `Arc`.
//!
//! ## Failure model
//!
//! | Condition | Result |
//! |-----------|--------|
//! | new key while at capacity | `Err(QueueError::Full)`; the caller keeps the update |
//! | lock poisoned by a panic | `Err(QueueError::Poisoned)`; fatal |
//! | key in the order without a payload | logged, skipped, next key returned |

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error};

use crate::errors::QueueError;

/// What [`DedupQueue::add`] did with the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The key was not waiting; it now sits at the back of the queue.
    Queued,
    /// The key was already waiting; its payload was replaced in place.
    Coalesced,
}

struct QueueState<K, V> {
    order: VecDeque<K>,
    entries: HashMap<K, V>,
}

/// A concurrency-safe FIFO of keys with last-write-wins payloads.
pub struct DedupQueue<K, V> {
    state: Mutex<QueueState<K, V>>,
    available: Notify,
    capacity: Option<NonZeroUsize>,
}

impl<K, V> DedupQueue<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a queue holding at most `capacity` distinct keys.
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Creates a queue with an optional bound on distinct keys.
    pub fn with_capacity(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
            available: Notify::new(),
            capacity,
        }
    }

    /// Returns the configured bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState<K, V>>, QueueError> {
        self.state.lock().map_err(|_| {
            error!("dedup queue lock poisoned");
            QueueError::Poisoned
        })
    }

    /// Queues `value` under `key`, or replaces the payload if `key` is
    /// already waiting.
    ///
    /// Coalescing never changes the key's position and is allowed even when
    /// the queue is full.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] if `key` is new and the queue is at capacity;
    /// [`QueueError::Poisoned`] if the lock is poisoned.
    pub fn add(&self, key: K, value: V) -> Result<AddOutcome, QueueError> {
        let mut state = self.lock()?;

        if let Some(slot) = state.entries.get_mut(&key) {
            *slot = value;
            debug!(?key, "coalesced update into queued entry");
            return Ok(AddOutcome::Coalesced);
        }

        if let Some(capacity) = self.capacity {
            if state.entries.len() >= capacity.get() {
                return Err(QueueError::Full {
                    capacity: capacity.get(),
                });
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(key, value);
        drop(state);

        self.available.notify_one();
        Ok(AddOutcome::Queued)
    }

    /// Removes the front entry without waiting.
    ///
    /// Returns `Ok(None)` if the queue is empty.
    pub fn try_remove_next(&self) -> Result<Option<(K, V)>, QueueError> {
        let mut state = self.lock()?;
        while let Some(key) = state.order.pop_front() {
            match state.entries.remove(&key) {
                Some(value) => return Ok(Some((key, value))),
                None => error!(?key, "queued key has no payload; skipping"),
            }
        }
        Ok(None)
    }

    /// Waits until an entry is available, then removes and returns the front
    /// entry.
    ///
    /// Waits indefinitely. Cancel safe: dropping the future before it
    /// completes removes nothing.
    pub async fn remove_next(&self) -> Result<(K, V), QueueError> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register as a waiter before checking, so an `add` that lands
            // between the check and the await still wakes this consumer.
            notified.as_mut().enable();

            if let Some(entry) = self.try_remove_next()? {
                return Ok(entry);
            }
            notified.await;
        }
    }

    /// Like [`remove_next`](Self::remove_next), but gives up when `cancel`
    /// completes.
    ///
    /// Returns `Ok(None)` on cancellation. Cancellation is checked first, so a
    /// stopping consumer does not keep draining a busy queue.
    pub async fn remove_next_until<F>(&self, cancel: F) -> Result<Option<(K, V)>, QueueError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => Ok(None),
            entry = self.remove_next() => entry.map(Some),
        }
    }

    /// Like [`remove_next`](Self::remove_next), but waits at most `timeout`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    pub async fn remove_next_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<(K, V)>, QueueError> {
        match tokio::time::timeout(timeout, self.remove_next()).await {
            Ok(entry) => entry.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Number of keys waiting.
    pub fn len(&self) -> usize {
        match self.state.lock() {
            Ok(state) => state.order.len(),
            Err(poisoned) => poisoned.into_inner().order.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for DedupQueue<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for DedupQueue<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
