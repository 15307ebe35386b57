use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::trace;

/// Configuration for an [`OperationListener`].
///
/// Diagnostics are opt-in at construction time; embedders that source the
/// flag from the environment do so once in their own configuration loader.
#[derive(Clone, Debug, Default)]
pub struct ListenerConfig {
    /// Record every live token's name, tag, and start time for post-mortem
    /// inspection via [`OperationListener::pending_operations`].
    pub track_operations: bool,
}

/// Diagnostic record for one in-flight operation.
#[derive(Clone, Debug)]
pub struct OperationRecord {
    /// Caller-supplied operation name.
    pub name: &'static str,
    /// Optional caller-supplied tag distinguishing operations of one name.
    pub tag: Option<String>,
    /// When the operation began.
    pub began_at: Instant,
}

/// Tracks asynchronous operations in flight and lets test infrastructure
/// join on their completion.
///
/// Every [`begin`](OperationListener::begin) increments an in-flight
/// counter; dropping the returned token decrements it. When the counter
/// transitions to zero, every pending [`wait`](OperationListener::wait)
/// future resolves. Cheap to clone; clones share one counter.
#[derive(Clone)]
pub struct OperationListener {
    inner: Arc<Inner>,
}

struct Inner {
    track_operations: bool,
    // Single non-reentrant lock over the counter, the pending waiters, and
    // the diagnostic records; every mutation path holds it.
    state: Mutex<ListenerState>,
}

#[derive(Default)]
struct ListenerState {
    in_flight: usize,
    next_token: u64,
    waiters: Vec<oneshot::Sender<()>>,
    records: HashMap<u64, OperationRecord>,
}

/// Handle for one in-flight operation. Dropping it marks the operation
/// complete.
#[must_use = "the operation is considered complete once its token drops"]
pub struct OperationToken {
    inner: Arc<Inner>,
    id: u64,
}

impl OperationListener {
    /// Create a listener with the given configuration.
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                track_operations: config.track_operations,
                state: Mutex::new(ListenerState::default()),
            }),
        }
    }

    /// Begin an operation.
    pub fn begin(&self, name: &'static str) -> OperationToken {
        self.begin_inner(name, None)
    }

    /// Begin an operation with a distinguishing tag.
    pub fn begin_tagged(&self, name: &'static str, tag: impl Into<String>) -> OperationToken {
        self.begin_inner(name, Some(tag.into()))
    }

    fn begin_inner(&self, name: &'static str, tag: Option<String>) -> OperationToken {
        let mut state = self.inner.state.lock().expect("listener lock poisoned");
        state.in_flight += 1;
        let id = state.next_token;
        state.next_token += 1;
        if self.inner.track_operations {
            state.records.insert(
                id,
                OperationRecord {
                    name,
                    tag,
                    began_at: Instant::now(),
                },
            );
        }
        trace!(name, id, in_flight = state.in_flight, "operation began");
        OperationToken {
            inner: self.inner.clone(),
            id,
        }
    }

    /// Number of operations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().expect("listener lock poisoned").in_flight
    }

    /// Returns `true` if no operation is in flight.
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Snapshot of the diagnostic records for every live token.
    ///
    /// Empty unless [`ListenerConfig::track_operations`] was set.
    pub fn pending_operations(&self) -> Vec<OperationRecord> {
        self.inner
            .state
            .lock()
            .expect("listener lock poisoned")
            .records
            .values()
            .cloned()
            .collect()
    }

    /// Future that resolves once no operation is in flight.
    ///
    /// Already resolved if the listener is currently idle; otherwise
    /// resolves on the next zero transition of the counter.
    pub fn wait(&self) -> impl Future<Output = ()> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.state.lock().expect("listener lock poisoned");
            if state.in_flight == 0 {
                let _ = tx.send(());
            } else {
                state.waiters.push(tx);
            }
        }
        async move {
            // A dropped listener counts as idle.
            let _ = rx.await;
        }
    }
}

impl Drop for OperationToken {
    fn drop(&mut self) {
        let waiters = {
            let mut state = self.inner.state.lock().expect("listener lock poisoned");
            state.in_flight -= 1;
            state.records.remove(&self.id);
            trace!(id = self.id, in_flight = state.in_flight, "operation ended");
            if state.in_flight == 0 {
                std::mem::take(&mut state.waiters)
            } else {
                Vec::new()
            }
        };
        // Completed only after the guard is released, and each waiter
        // resumes on its own task: a waiter's continuation can re-enter the
        // listener without deadlocking on the non-reentrant lock.
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn listener() -> OperationListener {
        OperationListener::new(ListenerConfig::default())
    }

    #[tokio::test]
    async fn wait_resolves_immediately_when_idle() {
        let listener = listener();
        assert!(listener.is_idle());
        listener.wait().await;
    }

    #[tokio::test]
    async fn wait_pends_while_operations_in_flight() {
        let listener = listener();
        let _token = listener.begin("sync");
        let result = timeout(Duration::from_millis(20), listener.wait()).await;
        assert!(result.is_err(), "wait resolved with an operation in flight");
    }

    #[tokio::test]
    async fn wait_resolves_after_all_tokens_drop() {
        let listener = listener();
        let tokens: Vec<_> = (0..3).map(|_| listener.begin("sync")).collect();
        assert_eq!(listener.in_flight(), 3);

        let wait = listener.wait();
        drop(tokens);
        wait.await;
        assert!(listener.is_idle());
    }

    #[tokio::test]
    async fn all_pending_waiters_resolve_on_zero_transition() {
        let listener = listener();
        let token = listener.begin("sync");
        let first = listener.wait();
        let second = listener.wait();
        drop(token);
        first.await;
        second.await;
    }

    #[tokio::test]
    async fn counter_survives_interleaved_operations() {
        let listener = listener();
        let a = listener.begin("resolve");
        let b = listener.begin("rebuild");
        drop(a);
        assert_eq!(listener.in_flight(), 1);
        let wait = listener.wait();
        drop(b);
        wait.await;
    }

    #[tokio::test]
    async fn token_dropped_on_another_thread_completes_join() {
        let listener = listener();
        let token = listener.begin("background");
        let handle = std::thread::spawn(move || drop(token));
        handle.join().unwrap();
        listener.wait().await;
    }

    #[tokio::test]
    async fn tracking_records_names_and_tags() {
        let listener = OperationListener::new(ListenerConfig {
            track_operations: true,
        });
        let _a = listener.begin("resolve");
        let _b = listener.begin_tagged("rebuild", "snapshot-7");

        let mut pending = listener.pending_operations();
        pending.sort_by_key(|record| record.name);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].name, "rebuild");
        assert_eq!(pending[0].tag.as_deref(), Some("snapshot-7"));
        assert_eq!(pending[1].name, "resolve");
        assert_eq!(pending[1].tag, None);
    }

    #[tokio::test]
    async fn records_removed_when_tokens_drop() {
        let listener = OperationListener::new(ListenerConfig {
            track_operations: true,
        });
        let token = listener.begin("resolve");
        assert_eq!(listener.pending_operations().len(), 1);
        drop(token);
        assert!(listener.pending_operations().is_empty());
    }

    #[test]
    fn tracking_disabled_records_nothing() {
        let listener = listener();
        let _token = listener.begin("resolve");
        assert!(listener.pending_operations().is_empty());
        assert_eq!(listener.in_flight(), 1);
    }
}
