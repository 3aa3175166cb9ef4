//! tidings-scheduler — persisted notification schedules kept in step with
//! the platform's notification dispatcher.
//!
//! The `ScheduleStore`:
//!
//! - Persists schedule records keyed by schedule id
//! - Maintains a pending index ordered by fire time
//! - Answers "what is due by time T" from that index
//! - Reconciles local schedules against the dispatcher's live requests
//!
//! # Architecture
//!
//! ```text
//! ScheduleStore
//!   ├── KeyedStore "NotificationSchedule" (id → schedule record)
//!   ├── KeyedStore "PendingSchedules"     ("pending" → pending index)
//!   ├── PendingIndex (in-memory mirror, guarded by the store mutex)
//!   └── NotificationDispatcher (external source of truth for live ids)
//! ```
//!
//! The two keyed stores are an eventually-consistent pair: listings skip
//! index entries whose record no longer exists.

pub mod config;
pub mod dispatcher;
pub mod epoch;
pub mod error;
pub mod pending;
pub mod record;
pub mod store;
pub mod sync;

pub use config::{SchedulerConfig, StorageConfig};
pub use dispatcher::{BoxFuture, InMemoryDispatcher, NotificationDispatcher, PendingRequest};
pub use error::{SchedulerError, SchedulerResult};
pub use pending::PendingIndex;
pub use record::{JsonScheduleCodec, ScheduleCodec, ScheduleRecord};
pub use store::ScheduleStore;
