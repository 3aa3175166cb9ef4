//! KeyedStore — a tag-namespaced mapping from string keys to records.
//!
//! Every operation runs under one mutex per store, so refresh-modify-write
//! sequences never interleave and no reader observes a half-applied write.
//! The substrate is the source of truth: the in-memory cache is re-read
//! before every operation and the whole dictionary is written back after
//! every mutation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::substrate::{Dictionary, Record, Substrate};

/// Durable, fully serialized key → record container for one tag.
pub struct KeyedStore {
    tag: String,
    substrate: Option<Arc<dyn Substrate>>,
    objects: Mutex<Dictionary>,
}

impl KeyedStore {
    /// Create a store for `tag` over the given substrate.
    pub fn new(tag: impl Into<String>, substrate: Arc<dyn Substrate>) -> Self {
        Self {
            tag: tag.into(),
            substrate: Some(substrate),
            objects: Mutex::new(Dictionary::new()),
        }
    }

    /// Create a store with no backing substrate.
    ///
    /// Every operation acts on an empty dictionary and nothing is retained.
    pub fn detached(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            substrate: None,
            objects: Mutex::new(Dictionary::new()),
        }
    }

    /// The tag this store is namespaced under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Return the record stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Record> {
        let mut objects = self.lock();
        self.refresh(&mut objects);
        objects.get(key).and_then(Value::as_object).cloned()
    }

    /// Store `record` under `key`, replacing any previous entry.
    ///
    /// An empty key or a missing record is ignored.
    pub fn set(&self, key: &str, record: Option<Record>) {
        let Some(record) = record else {
            return;
        };
        if key.is_empty() {
            return;
        }

        let mut objects = self.lock();
        if !self.refresh(&mut objects) {
            warn!(tag = %self.tag, %key, "set abandoned, dictionary unreadable");
            return;
        }
        objects.insert(key.to_string(), Value::Object(record));
        self.persist(&objects);
        debug!(tag = %self.tag, %key, "record stored");
    }

    /// Store `record` under `key`.
    pub fn put(&self, key: &str, record: Record) {
        self.set(key, Some(record));
    }

    /// Delete the entry under `key`. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }

        let mut objects = self.lock();
        if !self.refresh(&mut objects) {
            warn!(tag = %self.tag, %key, "remove abandoned, dictionary unreadable");
            return false;
        }
        let existed = objects.remove(key).is_some();
        self.persist(&objects);
        debug!(tag = %self.tag, %key, existed, "record removed");
        existed
    }

    /// Clear every entry and persist the empty dictionary.
    pub fn remove_all(&self) {
        let mut objects = self.lock();
        objects.clear();
        self.persist(&objects);
        debug!(tag = %self.tag, "all records removed");
    }

    /// Every entry that decodes as a record, in key order.
    pub fn get_all(&self) -> Vec<Record> {
        self.collect(|_| true)
    }

    /// Every record whose key starts with `prefix`, in key order.
    pub fn get_all_starting_with(&self, prefix: &str) -> Vec<Record> {
        self.collect(|key| key.starts_with(prefix))
    }

    fn collect(&self, matches: impl Fn(&str) -> bool) -> Vec<Record> {
        let mut objects = self.lock();
        self.refresh(&mut objects);
        objects
            .iter()
            .filter(|(key, _)| matches(key))
            .filter_map(|(_, value)| value.as_object().cloned())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Dictionary> {
        // The cache is reloaded on every call, so a poisoned guard holds nothing worth protecting.
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reload the cache from the substrate. Returns false if the load failed.
    fn refresh(&self, objects: &mut Dictionary) -> bool {
        let Some(substrate) = &self.substrate else {
            objects.clear();
            return true;
        };
        match substrate.load_dictionary(&self.tag) {
            Ok(loaded) => {
                *objects = loaded.unwrap_or_default();
                true
            }
            Err(e) => {
                warn!(tag = %self.tag, error = %e, "failed to load dictionary, treating as empty");
                objects.clear();
                false
            }
        }
    }

    fn persist(&self, objects: &Dictionary) {
        let Some(substrate) = &self.substrate else {
            return;
        };
        if let Err(e) = substrate.save_dictionary(&self.tag, objects) {
            warn!(tag = %self.tag, error = %e, "failed to save dictionary");
        }
    }
}

impl std::fmt::Debug for KeyedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedStore")
            .field("tag", &self.tag)
            .field("detached", &self.substrate.is_none())
            .finish_non_exhaustive()
    }
}
