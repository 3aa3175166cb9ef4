//! PendingIndex — fire time → schedule id, ordered by fire time.
//!
//! Persisted as a single record whose keys are `<epoch>#<id>` entry keys
//! (see [`crate::epoch`]) and whose values are schedule id strings.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde_json::Value;
use tidings_state::Record;
use tracing::{debug, warn};

use crate::epoch::{entry_epoch, entry_key, epoch_key, parse_epoch_key, parse_seconds_key};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingIndex {
    entries: BTreeMap<String, String>,
}

impl PendingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted record. Non-string values are skipped.
    ///
    /// Keys in the older fractional-seconds form (`"1700000000.5"`) are
    /// re-keyed as `<epoch>#<id>`; keys in neither form are dropped.
    pub fn from_record(record: &Record) -> Self {
        let mut entries = BTreeMap::new();
        let mut migrated = 0usize;

        for (key, value) in record {
            let Some(id) = value.as_str() else {
                continue;
            };
            if parse_epoch_key(entry_epoch(key)).is_some() {
                entries.insert(key.clone(), id.to_string());
            } else if let Some(fire_time) = parse_seconds_key(key) {
                entries.insert(entry_key(fire_time, id), id.to_string());
                migrated += 1;
            } else {
                warn!(%key, %id, "unrecognised pending index key, entry dropped");
            }
        }

        if migrated > 0 {
            debug!(migrated, "legacy pending index entries re-keyed");
        }
        Self { entries }
    }

    pub fn to_record(&self) -> Record {
        self.entries
            .iter()
            .map(|(key, id)| (key.clone(), Value::String(id.clone())))
            .collect()
    }

    /// Index `id` as firing at `fire_time`, replacing any earlier entry for it.
    pub fn insert(&mut self, fire_time: SystemTime, id: &str) {
        self.remove_id(id);
        self.entries.insert(entry_key(fire_time, id), id.to_string());
    }

    /// Drop every entry pointing at `id`. Returns how many were removed.
    pub fn remove_id(&mut self, id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, scheduled| scheduled != id);
        before - self.entries.len()
    }

    /// Ids due at or before `reference`, earliest first.
    pub fn due(&self, reference: SystemTime) -> Vec<String> {
        let reference = epoch_key(reference);
        self.entries
            .iter()
            .filter(|(key, _)| entry_epoch(key) <= reference.as_str())
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
