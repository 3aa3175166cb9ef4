//! tidings-state — tagged key-value containers for Tidings.
//!
//! Backed by [redb](https://docs.rs/redb). Each container is identified by a
//! tag and persisted as one JSON document, so every write replaces the whole
//! dictionary for that tag.
//!
//! # Architecture
//!
//! ```text
//! StoreRegistry (one per process)
//!   └── KeyedStore (one per tag, serialized refresh-modify-write)
//!         └── Substrate (RedbSubstrate: tag → JSON bytes)
//! ```
//!
//! Stores are `Send` + `Sync` and handed out as `Arc<KeyedStore>` so they can
//! be shared across threads and tasks.

pub mod error;
pub mod keyed;
pub mod registry;
pub mod substrate;
pub mod tables;

pub use error::{StateError, StateResult};
pub use keyed::KeyedStore;
pub use registry::StoreRegistry;
pub use substrate::{Dictionary, Record, RedbSubstrate, Substrate};
