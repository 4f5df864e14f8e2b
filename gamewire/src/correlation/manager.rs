//! Single-flight pending request map.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use log::{debug, warn};
use tokio::{sync::oneshot, task::JoinHandle, time::Instant};

use super::{
    errors::{CorrelationError, CorrelationResult},
    models::{CorrelationKey, PendingReply},
};

struct Entry<T> {
    /// Distinguishes this entry from any later entry under the same key.
    ticket: u64,
    tx: oneshot::Sender<CorrelationResult<T>>,
    timer: JoinHandle<()>,
    created_at: Instant,
}

impl<T> Entry<T> {
    fn settle(self, outcome: CorrelationResult<T>) {
        self.timer.abort();
        // The waiter may have given up; nothing to do then.
        let _ = self.tx.send(outcome);
    }
}

struct Inner<T> {
    entries: Mutex<HashMap<CorrelationKey, Entry<T>>>,
    next_ticket: AtomicU64,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationKey, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in entries.drain() {
            entry.timer.abort();
        }
    }
}

/// Shared map of outstanding requests.
///
/// At most one entry exists per key. Cloning yields another handle to the same
/// map. [`begin`](Self::begin) spawns a deadline timer and must be called
/// from within a Tokio runtime.
pub struct PendingRequests<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PendingRequests<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> PendingRequests<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    /// Start waiting for a response under `key`.
    ///
    /// An existing entry for `key` is failed with
    /// [`CorrelationError::Superseded`] and replaced atomically. The new entry
    /// fails with [`CorrelationError::Timeout`] if nothing settles it within
    /// `timeout`.
    ///
    /// # Arguments
    ///
    /// * `key` - Category slot or request sequence
    /// * `timeout` - Deadline measured from now
    ///
    /// # Returns
    ///
    /// * `PendingReply<T>` - Handle resolving to the response or the failure
    pub fn begin(&self, key: CorrelationKey, timeout: Duration) -> PendingReply<T> {
        let (tx, rx) = oneshot::channel();
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);

        let superseded = {
            let mut entries = self.inner.lock();
            // Spawned under the lock so an immediate expiry cannot run before
            // the entry is inserted.
            let timer = tokio::spawn(expire(
                Arc::downgrade(&self.inner),
                key.clone(),
                ticket,
                timeout,
            ));
            entries.insert(
                key.clone(),
                Entry {
                    ticket,
                    tx,
                    timer,
                    created_at: Instant::now(),
                },
            )
        };

        if let Some(old) = superseded {
            warn!("{key} superseded by a newer request");
            old.settle(Err(CorrelationError::Superseded));
        }
        debug!("{key} pending, timeout {timeout:?}");

        PendingReply::new(key, rx)
    }

    /// Complete the entry for `key` with `value`.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether an entry existed; late responses are a no-op
    pub fn resolve(&self, key: &CorrelationKey, value: T) -> bool {
        self.settle(key, Ok(value))
    }

    /// Fail the entry for `key` with `error`. No-op if absent.
    pub fn reject(&self, key: &CorrelationKey, error: CorrelationError) -> bool {
        self.settle(key, Err(error))
    }

    /// Fail the entry for `key` with [`CorrelationError::Cancelled`].
    pub fn cancel(&self, key: &CorrelationKey) -> bool {
        self.reject(key, CorrelationError::Cancelled)
    }

    /// Fail every outstanding entry with `error`.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of entries failed
    pub fn fail_all(&self, error: CorrelationError) -> usize {
        let drained: Vec<_> = self.inner.lock().drain().collect();
        let count = drained.len();
        for (key, entry) in drained {
            debug!("{key} failed: {error}");
            entry.settle(Err(error.clone()));
        }
        count
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How long the entry for `key` has been waiting.
    pub fn age(&self, key: &CorrelationKey) -> Option<Duration> {
        self.inner
            .lock()
            .get(key)
            .map(|entry| entry.created_at.elapsed())
    }

    fn settle(&self, key: &CorrelationKey, outcome: CorrelationResult<T>) -> bool {
        let Some(entry) = self.inner.lock().remove(key) else {
            debug!("{key} has no pending request");
            return false;
        };
        debug!(
            "{key} settled after {:?} ({})",
            entry.created_at.elapsed(),
            if outcome.is_ok() { "ok" } else { "error" }
        );
        entry.settle(outcome);
        true
    }
}

impl<T: Send + 'static> Default for PendingRequests<T> {
    fn default() -> Self {
        Self::new()
    }
}

async fn expire<T>(inner: Weak<Inner<T>>, key: CorrelationKey, ticket: u64, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let expired = {
        let mut entries = inner.lock();
        match entries.get(&key) {
            Some(entry) if entry.ticket == ticket => entries.remove(&key),
            // Settled or replaced; the replacement has its own timer.
            _ => None,
        }
    };
    if let Some(entry) = expired {
        warn!("{key} timed out after {timeout:?}");
        // Not via `settle`: aborting our own handle here is pointless.
        let _ = entry.tx.send(Err(CorrelationError::Timeout(timeout)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login() -> CorrelationKey {
        CorrelationKey::category("login")
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersession() {
        let pending = PendingRequests::new();
        let first = pending.begin(login(), Duration::from_secs(30));
        let second = pending.begin(login(), Duration::from_secs(30));
        assert_eq!(pending.len(), 1);

        assert_eq!(first.await, Err(CorrelationError::Superseded));
        assert!(pending.resolve(&login(), 42));
        assert_eq!(second.await, Ok(42));
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_resolve_is_noop() {
        let pending = PendingRequests::<u32>::new();
        let start = Instant::now();
        let reply = pending.begin(login(), Duration::from_millis(50));

        let result = reply.await;
        assert_eq!(result, Err(CorrelationError::Timeout(Duration::from_millis(50))));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!pending.contains(&login()));
        assert!(!pending.resolve(&login(), 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_leaves_replacement_alone() {
        let pending = PendingRequests::<u32>::new();
        let _first = pending.begin(login(), Duration::from_millis(10));
        let second = pending.begin(login(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pending.contains(&login()));
        assert!(pending.resolve(&login(), 7));
        assert_eq!(second.await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_and_absent_keys() {
        let pending = PendingRequests::<u32>::new();
        assert!(!pending.reject(&login(), CorrelationError::Cancelled));

        let reply = pending.begin(CorrelationKey::Sequence(7), Duration::from_secs(5));
        let err = CorrelationError::Server {
            opcode: 400,
            message: "Email already exists".to_string(),
        };
        assert!(pending.reject(&CorrelationKey::Sequence(7), err.clone()));
        assert_eq!(reply.await, Err(err));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_all() {
        let pending = PendingRequests::<u32>::new();
        let a = pending.begin(login(), Duration::from_secs(5));
        let b = pending.begin(CorrelationKey::Sequence(3), Duration::from_secs(5));

        assert_eq!(pending.fail_all(CorrelationError::Disconnected), 2);
        assert_eq!(a.await, Err(CorrelationError::Disconnected));
        assert_eq!(b.await, Err(CorrelationError::Disconnected));
        assert_eq!(pending.fail_all(CorrelationError::Disconnected), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_map_cancels_replies() {
        let pending = PendingRequests::<u32>::new();
        let reply = pending.begin(login(), Duration::from_secs(5));
        drop(pending);
        assert_eq!(reply.await, Err(CorrelationError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_categories_and_sequences_are_distinct_slots() {
        let pending = PendingRequests::<&'static str>::new();
        let by_name = pending.begin(login(), Duration::from_secs(5));
        let by_seq = pending.begin(CorrelationKey::Sequence(1), Duration::from_secs(5));
        assert_eq!(pending.len(), 2);

        pending.resolve(&CorrelationKey::Sequence(1), "seq");
        pending.resolve(&login(), "name");
        assert_eq!(by_seq.await, Ok("seq"));
        assert_eq!(by_name.await, Ok("name"));
    }
}
