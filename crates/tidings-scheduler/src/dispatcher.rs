//! The notification dispatcher — the platform service that actually fires
//! notifications and is the source of truth for which ones are still live.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::SchedulerResult;

/// Boxed future returned by dispatcher queries.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A request the dispatcher still intends to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingRequest {
    pub identifier: String,
}

impl PendingRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

/// External scheduler consumed by the schedule store.
///
/// The store can only observe the dispatcher's live set and cancel entries
/// in it; it never arms notifications itself.
pub trait NotificationDispatcher: Send + Sync {
    /// Every request the dispatcher currently considers live.
    fn pending_requests(&self) -> BoxFuture<'_, SchedulerResult<Vec<PendingRequest>>>;

    /// Cancel one pending request.
    fn cancel(&self, identifier: &str) -> SchedulerResult<()>;

    /// Cancel every pending request.
    fn cancel_all(&self) -> SchedulerResult<()>;
}

/// Dispatcher that keeps its live set in memory.
///
/// Serves as a stand-in for the platform dispatcher in tests and offline tools.
#[derive(Debug, Default)]
pub struct InMemoryDispatcher {
    live: Mutex<BTreeSet<String>>,
}

impl InMemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that reports `ids` as live.
    pub fn with_live<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dispatcher = Self::new();
        for id in ids {
            dispatcher.arm(id);
        }
        dispatcher
    }

    /// Mark `id` as live.
    pub fn arm(&self, id: impl Into<String>) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into());
    }

    /// Currently live identifiers, sorted.
    pub fn live(&self) -> Vec<String> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl NotificationDispatcher for InMemoryDispatcher {
    fn pending_requests(&self) -> BoxFuture<'_, SchedulerResult<Vec<PendingRequest>>> {
        let requests = self.live().into_iter().map(PendingRequest::new).collect();
        Box::pin(async move { Ok(requests) })
    }

    fn cancel(&self, identifier: &str) -> SchedulerResult<()> {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identifier);
        debug!(%identifier, removed, "dispatcher request cancelled");
        Ok(())
    }

    fn cancel_all(&self) -> SchedulerResult<()> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).clear();
        debug!("all dispatcher requests cancelled");
        Ok(())
    }
}
