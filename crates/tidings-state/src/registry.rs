//! StoreRegistry — one `KeyedStore` per tag, shared by every caller.
//!
//! Construct a registry once at startup and hand clones of it to whoever
//! needs a store. Asking for the same tag twice returns the same instance,
//! so all callers in the process share one ordering primitive per tag.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::keyed::KeyedStore;
use crate::substrate::Substrate;

/// Registry of tag-scoped stores over a single substrate.
#[derive(Clone)]
pub struct StoreRegistry {
    substrate: Option<Arc<dyn Substrate>>,
    stores: Arc<Mutex<HashMap<String, Arc<KeyedStore>>>>,
}

impl StoreRegistry {
    /// Create a registry whose stores persist into `substrate`.
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self {
            substrate: Some(substrate),
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a registry that hands out detached stores.
    pub fn detached() -> Self {
        Self {
            substrate: None,
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the store for `tag`, creating it on first use.
    pub fn store(&self, tag: &str) -> Arc<KeyedStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(tag.to_string())
            .or_insert_with(|| {
                debug!(%tag, "keyed store created");
                let store = match &self.substrate {
                    Some(substrate) => KeyedStore::new(tag, substrate.clone()),
                    None => KeyedStore::detached(tag),
                };
                Arc::new(store)
            })
            .clone()
    }

    /// Tags with a store opened through this registry, sorted.
    pub fn tags(&self) -> Vec<String> {
        let stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tags: Vec<String> = stores.keys().cloned().collect();
        tags.sort();
        tags
    }
}
