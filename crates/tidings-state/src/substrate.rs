//! Durable substrate — whole-dictionary persistence keyed by tag.
//!
//! The substrate only knows how to load and save complete dictionaries; it
//! has no notion of individual keys. `RedbSubstrate` stores every dictionary
//! as a JSON object in a single redb table and supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::DICTIONARIES;

/// One tagged container: string keys to opaque JSON values.
pub type Dictionary = Map<String, Value>;

/// A structured record: field name to value.
pub type Record = Map<String, Value>;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Whole-document storage for tagged dictionaries.
///
/// Implementations must make `save_dictionary` atomic with respect to
/// `load_dictionary`: a concurrent load sees either the old or the new
/// dictionary, never a mix.
pub trait Substrate: Send + Sync {
    /// Load the dictionary stored under `tag`, or `None` if nothing was saved yet.
    fn load_dictionary(&self, tag: &str) -> StateResult<Option<Dictionary>>;

    /// Replace the dictionary stored under `tag`.
    fn save_dictionary(&self, tag: &str, dictionary: &Dictionary) -> StateResult<()>;
}

/// Thread-safe substrate backed by redb.
#[derive(Clone)]
pub struct RedbSubstrate {
    db: Arc<Database>,
}

impl RedbSubstrate {
    /// Open (or create) a persistent substrate at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let substrate = Self { db: Arc::new(db) };
        substrate.ensure_tables()?;
        debug!(?path, "substrate opened");
        Ok(substrate)
    }

    /// Create an ephemeral in-memory substrate (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let substrate = Self { db: Arc::new(db) };
        substrate.ensure_tables()?;
        debug!("in-memory substrate opened");
        Ok(substrate)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DICTIONARIES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List the tags that currently have a saved dictionary.
    pub fn tags(&self) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DICTIONARIES).map_err(map_err!(Table))?;
        let mut tags = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            tags.push(key.value().to_string());
        }
        Ok(tags)
    }
}

impl Substrate for RedbSubstrate {
    fn load_dictionary(&self, tag: &str) -> StateResult<Option<Dictionary>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DICTIONARIES).map_err(map_err!(Table))?;
        match table.get(tag).map_err(map_err!(Read))? {
            Some(guard) => {
                let dictionary: Dictionary =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(dictionary))
            }
            None => Ok(None),
        }
    }

    fn save_dictionary(&self, tag: &str, dictionary: &Dictionary) -> StateResult<()> {
        let value = serde_json::to_vec(dictionary).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DICTIONARIES).map_err(map_err!(Table))?;
            table
                .insert(tag, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%tag, entries = dictionary.len(), "dictionary saved");
        Ok(())
    }
}
