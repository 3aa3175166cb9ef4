//! Reconciliation against the notification dispatcher.
//!
//! The dispatcher fires, expires and evicts requests on its own, so local
//! schedules drift. Reconciliation asks the dispatcher for its live set and
//! retires every local schedule the dispatcher no longer knows about. It is
//! best-effort: each step is an ordinary serialized store operation, not a
//! transaction.

use std::collections::HashSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatcher::PendingRequest;
use crate::record::ScheduleRecord;
use crate::store::ScheduleStore;

impl ScheduleStore {
    /// Reconcile with the dispatcher and return the confirmed-active schedules.
    ///
    /// The store work runs on the blocking pool. If the dispatcher cannot be
    /// queried nothing is changed and the result is empty.
    pub async fn sync_pending(&self) -> Vec<ScheduleRecord> {
        let requests = match self.dispatcher().pending_requests().await {
            Ok(requests) => requests,
            Err(e) => {
                error!(error = %e, "failed to query dispatcher, reconciliation skipped");
                return Vec::new();
            }
        };
        debug!(live = requests.len(), "dispatcher pending requests received");

        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.reconcile(&requests)).await {
            Ok(active) => active,
            Err(e) => {
                error!(error = %e, "reconciliation task failed");
                Vec::new()
            }
        }
    }

    /// Apply one reconciliation pass against an already-fetched live set.
    ///
    /// An empty live set is treated as an external reset and clears every
    /// local schedule. Otherwise schedules missing from the live set lose
    /// their record through [`ScheduleStore::cancel_scheduled`]. Records
    /// without an id are left alone.
    pub fn reconcile(&self, requests: &[PendingRequest]) -> Vec<ScheduleRecord> {
        if requests.is_empty() {
            self.cancel_all_schedules();
            info!("dispatcher reports no live requests, all schedules cancelled");
            return Vec::new();
        }

        let live: HashSet<&str> = requests.iter().map(|r| r.identifier.as_str()).collect();
        let mut active = Vec::new();
        let mut cancelled = 0usize;

        for schedule in self.list_schedules() {
            let Some(id) = schedule.id() else {
                continue;
            };
            if live.contains(id.to_string().as_str()) {
                active.push(schedule);
            } else {
                self.cancel_scheduled(id);
                cancelled += 1;
            }
        }

        info!(active = active.len(), cancelled, "schedules reconciled with dispatcher");
        active
    }

    /// Reconcile in the background and hand the active schedules to `callback`.
    ///
    /// The callback runs exactly once, on `runtime`. An error it returns is
    /// logged and goes no further.
    pub fn sync_all_pending_schedules<F>(&self, runtime: &Handle, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Vec<ScheduleRecord>) -> anyhow::Result<()> + Send + 'static,
    {
        let store = self.clone();
        runtime.spawn(async move {
            let active = store.sync_pending().await;
            if let Err(e) = callback(active) {
                error!(error = %e, "error in sync completion callback");
            }
        })
    }

    /// Reconcile and wait up to `timeout` for the result.
    ///
    /// For synchronous callers; must not be called from a runtime worker
    /// thread. On timeout this returns `None` while reconciliation finishes
    /// in the background; its result is then discarded, never delivered.
    pub fn sync_all_pending_schedules_blocking(
        &self,
        runtime: &Handle,
        timeout: Duration,
    ) -> Option<Vec<ScheduleRecord>> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.sync_all_pending_schedules(runtime, move |active| {
            // The receiver is gone if the caller already timed out.
            let _ = tx.send(active);
            Ok(())
        });

        match rx.recv_timeout(timeout) {
            Ok(active) => Some(active),
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "reconciliation did not finish in time");
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("reconciliation task ended without a result");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::dispatcher::{BoxFuture, InMemoryDispatcher, NotificationDispatcher};
    use crate::error::{SchedulerError, SchedulerResult};
    use std::sync::{Arc, Mutex};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tidings_state::{RedbSubstrate, StoreRegistry};
    use tokio::sync::oneshot;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn store_with(dispatcher: Arc<dyn NotificationDispatcher>) -> ScheduleStore {
        let registry = StoreRegistry::new(Arc::new(RedbSubstrate::open_in_memory().unwrap()));
        ScheduleStore::open(&registry, &SchedulerConfig::default(), dispatcher)
    }

    fn seed(store: &ScheduleStore, ids: &[i64]) {
        for &id in ids {
            store.save_schedule(&ScheduleRecord::new(id), at(100 + id as u64));
        }
    }

    fn ids(records: &[ScheduleRecord]) -> Vec<i64> {
        records.iter().filter_map(ScheduleRecord::id).collect()
    }

    /// Dispatcher whose query always fails.
    struct Unreachable;

    impl NotificationDispatcher for Unreachable {
        fn pending_requests(&self) -> BoxFuture<'_, SchedulerResult<Vec<PendingRequest>>> {
            Box::pin(async { Err(SchedulerError::Dispatcher("service unavailable".to_string())) })
        }

        fn cancel(&self, _identifier: &str) -> SchedulerResult<()> {
            Ok(())
        }

        fn cancel_all(&self) -> SchedulerResult<()> {
            Ok(())
        }
    }

    /// Dispatcher that answers only once its gate is opened.
    struct Gated {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        live: Vec<String>,
    }

    impl NotificationDispatcher for Gated {
        fn pending_requests(&self) -> BoxFuture<'_, SchedulerResult<Vec<PendingRequest>>> {
            let gate = self.gate.lock().unwrap().take();
            let requests = self.live.iter().cloned().map(PendingRequest::new).collect();
            Box::pin(async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok(requests)
            })
        }

        fn cancel(&self, _identifier: &str) -> SchedulerResult<()> {
            Ok(())
        }

        fn cancel_all(&self) -> SchedulerResult<()> {
            Ok(())
        }
    }

    /// Dispatcher whose query panics inside the reconciliation task.
    struct Crashing;

    impl NotificationDispatcher for Crashing {
        #[allow(unreachable_code)]
        fn pending_requests(&self) -> BoxFuture<'_, SchedulerResult<Vec<PendingRequest>>> {
            Box::pin(async {
                let requests: SchedulerResult<Vec<PendingRequest>> = panic!("dispatcher crashed");
                requests
            })
        }

        fn cancel(&self, _identifier: &str) -> SchedulerResult<()> {
            Ok(())
        }

        fn cancel_all(&self) -> SchedulerResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn drops_schedules_the_dispatcher_forgot() {
        let store = store_with(Arc::new(InMemoryDispatcher::with_live(["1", "3"])));
        seed(&store, &[1, 2, 3]);

        let active = store.sync_pending().await;

        assert_eq!(ids(&active), vec![1, 3]);
        assert!(store.get_schedule_by_key(2).is_none());
        assert_eq!(ids(&store.list_schedules()), vec![1, 3]);
        // Partial removal: the index entry for 2 stays but no longer resolves.
        assert_eq!(store.pending_len(), 3);
        assert_eq!(ids(&store.list_pending_schedules(at(1000))), vec![1, 3]);
    }

    #[tokio::test]
    async fn empty_live_set_cancels_everything() {
        let store = store_with(Arc::new(InMemoryDispatcher::new()));
        seed(&store, &[1, 2]);

        let active = store.sync_pending().await;

        assert!(active.is_empty());
        assert!(store.list_schedules().is_empty());
        assert_eq!(store.pending_len(), 0);
    }

    #[tokio::test]
    async fn dispatcher_failure_leaves_state_untouched() {
        let store = store_with(Arc::new(Unreachable));
        seed(&store, &[1, 2]);

        let active = store.sync_pending().await;

        assert!(active.is_empty());
        assert_eq!(ids(&store.list_schedules()), vec![1, 2]);
    }

    #[test]
    fn records_without_id_are_skipped() {
        let store = store_with(Arc::new(InMemoryDispatcher::new()));
        seed(&store, &[1]);
        store.save_schedule(&ScheduleRecord::default().with_field("title", "no id"), at(50));

        let active = store.reconcile(&[PendingRequest::new("9")]);

        assert!(active.is_empty());
        assert!(store.get_schedule_by_key(1).is_none());
        assert_eq!(store.list_schedules().len(), 1);
    }

    #[tokio::test]
    async fn callback_receives_active_schedules_once() {
        let store = store_with(Arc::new(InMemoryDispatcher::with_live(["2"])));
        seed(&store, &[1, 2]);

        let (tx, rx) = oneshot::channel();
        let handle = store.sync_all_pending_schedules(&Handle::current(), move |active| {
            tx.send(ids(&active)).map_err(|_| anyhow::anyhow!("receiver dropped"))
        });

        handle.await.unwrap();
        assert_eq!(rx.await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn callback_error_is_contained() {
        let store = store_with(Arc::new(InMemoryDispatcher::with_live(["1"])));
        seed(&store, &[1, 2]);

        let handle = store.sync_all_pending_schedules(&Handle::current(), |_| {
            anyhow::bail!("caller exploded")
        });

        assert!(handle.await.is_ok());
        assert_eq!(ids(&store.list_schedules()), vec![1]);
    }

    #[test]
    fn blocking_sync_returns_result() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let store = store_with(Arc::new(InMemoryDispatcher::with_live(["1", "3"])));
        seed(&store, &[1, 2, 3]);

        let active = store
            .sync_all_pending_schedules_blocking(runtime.handle(), Duration::from_secs(5))
            .unwrap();

        assert_eq!(ids(&active), vec![1, 3]);
    }

    #[test]
    fn blocking_sync_times_out_and_finishes_in_background() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (open, gate) = oneshot::channel();
        let store = store_with(Arc::new(Gated {
            gate: Mutex::new(Some(gate)),
            live: vec!["1".to_string()],
        }));
        seed(&store, &[1, 2]);

        let result =
            store.sync_all_pending_schedules_blocking(runtime.handle(), Duration::from_millis(20));
        assert!(result.is_none());
        assert!(store.get_schedule_by_key(2).is_some());

        open.send(()).unwrap();
        let mut finished = false;
        for _ in 0..200 {
            if store.get_schedule_by_key(2).is_none() {
                finished = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(finished, "background reconciliation never completed");
        assert!(store.get_schedule_by_key(1).is_some());
    }

    #[test]
    fn blocking_sync_returns_early_when_task_dies() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let store = store_with(Arc::new(Crashing));
        seed(&store, &[1]);

        let started = std::time::Instant::now();
        let result =
            store.sync_all_pending_schedules_blocking(runtime.handle(), Duration::from_secs(30));

        assert!(result.is_none());
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(store.get_schedule_by_key(1).is_some());
    }
}
