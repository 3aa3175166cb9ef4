//! ScheduleStore — persisted schedules plus a fire-time index.
//!
//! Two keyed stores back each instance: one maps schedule ids to records,
//! the other holds the pending index under a single key. Every public
//! operation holds the instance mutex for its whole duration, so operations
//! on one instance are fully serialized.
//!
//! Write ordering is fixed: saving persists the record before the index,
//! removing persists the index before deleting the record. An interrupted
//! write can leave a record without an index entry but never an index entry
//! for a record that was not written. Listings skip index entries that no
//! longer resolve, which heals any remaining drift.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tidings_state::{KeyedStore, StoreRegistry};
use tracing::{debug, error, warn};

use crate::config::SchedulerConfig;
use crate::dispatcher::NotificationDispatcher;
use crate::epoch::epoch_key;
use crate::pending::PendingIndex;
use crate::record::{
    ID_FIELD, JsonScheduleCodec, ScheduleCodec, ScheduleRecord, decode_record, encode_record,
};

/// Handle to the schedule store. Clones share the same state.
#[derive(Clone)]
pub struct ScheduleStore {
    schedules: Arc<KeyedStore>,
    pending_store: Arc<KeyedStore>,
    pending_key: String,
    /// In-memory mirror of the persisted index; also the instance lock.
    pending: Arc<Mutex<PendingIndex>>,
    codec: Arc<dyn ScheduleCodec>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl ScheduleStore {
    /// Open the store using the tags named in `config`.
    ///
    /// Build one instance per tag pair and share clones of it: the pending
    /// index is cached per instance, so two instances over the same tags can
    /// drift apart.
    pub fn open(
        registry: &StoreRegistry,
        config: &SchedulerConfig,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let schedules = registry.store(&config.schedule_tag);
        let pending_store = registry.store(&config.pending_tag);
        let pending = load_index(&pending_store, &config.pending_key);
        debug!(
            schedule_tag = %config.schedule_tag,
            pending_tag = %config.pending_tag,
            pending = pending.len(),
            "schedule store opened"
        );

        Self {
            schedules,
            pending_store,
            pending_key: config.pending_key.clone(),
            pending: Arc::new(Mutex::new(pending)),
            codec: Arc::new(JsonScheduleCodec),
            dispatcher,
        }
    }

    /// Replace the record codec.
    pub fn with_codec(mut self, codec: Arc<dyn ScheduleCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Persist `record` and index it as firing at `fire_time`.
    ///
    /// A record without an id is stored under `"0"`; callers must supply
    /// unique positive ids to avoid collisions. A record whose `id` field is
    /// not an integer is rejected.
    pub fn save_schedule(&self, record: &ScheduleRecord, fire_time: SystemTime) {
        if record.id().is_none() {
            if let Some(id) = record.field(ID_FIELD) {
                warn!(%id, "schedule id is not an integer, schedule not saved");
                return;
            }
        }
        let key = record.key();
        let Some(encoded) = encode_record(self.codec.as_ref(), record) else {
            warn!(id = %key, "codec produced a non-record value, schedule not saved");
            return;
        };

        let mut pending = self.lock();
        pending.insert(fire_time, &key);
        self.schedules.put(&key, encoded);
        self.persist_index(&pending);
        debug!(id = %key, fire_at = %epoch_key(fire_time), "schedule saved");
    }

    /// Remove a schedule and every index entry pointing at it.
    ///
    /// Returns whether the schedule record existed.
    pub fn remove_schedule(&self, id: i64) -> bool {
        let key = id.to_string();
        let mut pending = self.lock();
        let unindexed = pending.remove_id(&key);
        self.persist_index(&pending);
        let existed = self.schedules.remove(&key);
        debug!(id = %key, unindexed, existed, "schedule removed");
        existed
    }

    /// Remove only the schedule record, leaving the index untouched.
    ///
    /// Used when the dispatcher already retired the request; the stale index
    /// entry no longer resolves and is skipped by listings.
    pub fn cancel_scheduled(&self, id: i64) -> bool {
        let key = id.to_string();
        let _pending = self.lock();
        let existed = self.schedules.remove(&key);
        debug!(id = %key, existed, "scheduled record cancelled");
        existed
    }

    /// Clear every schedule and the pending index.
    pub fn cancel_all_schedules(&self) -> bool {
        let mut pending = self.lock();
        self.schedules.remove_all();
        self.pending_store.remove_all();
        pending.clear();
        debug!("all schedules cancelled");
        true
    }

    /// Cancel `id` at the dispatcher, then remove it locally.
    ///
    /// A dispatcher failure is logged; local removal still happens.
    pub fn cancel_schedule(&self, id: i64) -> bool {
        if let Err(e) = self.dispatcher.cancel(&id.to_string()) {
            error!(%id, error = %e, "dispatcher failed to cancel request");
        }
        self.remove_schedule(id)
    }

    /// Cancel everything at the dispatcher, then clear local state.
    pub fn reset(&self) -> bool {
        if let Err(e) = self.dispatcher.cancel_all() {
            error!(error = %e, "dispatcher failed to cancel all requests");
        }
        self.cancel_all_schedules()
    }

    /// Look up one schedule by id.
    pub fn get_schedule_by_key(&self, id: i64) -> Option<ScheduleRecord> {
        let _pending = self.lock();
        self.lookup(&id.to_string())
    }

    /// Every persisted schedule that decodes, in key order.
    pub fn list_schedules(&self) -> Vec<ScheduleRecord> {
        let _pending = self.lock();
        self.schedules
            .get_all()
            .into_iter()
            .filter_map(|record| decode_record(self.codec.as_ref(), record))
            .collect()
    }

    /// Schedules due at or before `reference`, earliest first.
    ///
    /// Index entries whose record has since been removed are dropped.
    pub fn list_pending_schedules(&self, reference: SystemTime) -> Vec<ScheduleRecord> {
        let pending = self.lock();
        pending
            .due(reference)
            .iter()
            .filter_map(|id| self.lookup(id))
            .collect()
    }

    /// Number of entries in the in-memory pending index.
    pub fn pending_len(&self) -> usize {
        self.lock().len()
    }

    /// Re-read the pending index from storage, discarding the cached copy.
    pub fn reload_pending(&self) {
        let mut pending = self.lock();
        *pending = load_index(&self.pending_store, &self.pending_key);
        debug!(pending = pending.len(), "pending index reloaded");
    }

    pub(crate) fn dispatcher(&self) -> &Arc<dyn NotificationDispatcher> {
        &self.dispatcher
    }

    fn lookup(&self, key: &str) -> Option<ScheduleRecord> {
        self.schedules
            .get(key)
            .and_then(|record| decode_record(self.codec.as_ref(), record))
    }

    fn persist_index(&self, pending: &PendingIndex) {
        self.pending_store.put(&self.pending_key, pending.to_record());
    }

    fn lock(&self) -> MutexGuard<'_, PendingIndex> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_index(store: &KeyedStore, key: &str) -> PendingIndex {
    store
        .get(key)
        .map(|record| PendingIndex::from_record(&record))
        .unwrap_or_default()
}
