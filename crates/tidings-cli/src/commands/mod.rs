pub mod schedule;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tidings_scheduler::{InMemoryDispatcher, NotificationDispatcher, ScheduleRecord, ScheduleStore, SchedulerConfig};
use tidings_state::StoreRegistry;
use tracing::debug;

/// Database file used when neither the config nor `--data` names one.
const DEFAULT_DATA_FILE: &str = "tidings.redb";

/// Opened configuration and registry shared by every command.
pub struct Context {
    pub config: SchedulerConfig,
    pub registry: StoreRegistry,
}

impl Context {
    pub fn load(config_path: Option<&Path>, data: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(path) => SchedulerConfig::from_file(path)?,
            None => SchedulerConfig::default(),
        };
        if let Some(data) = data {
            config.storage.path = Some(data);
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(PathBuf::from(DEFAULT_DATA_FILE));
        }
        debug!(path = ?config.storage.path, "opening schedule store");

        let registry = StoreRegistry::new(config.open_substrate()?);
        Ok(Self { config, registry })
    }

    /// Schedule store with no live dispatcher behind it.
    pub fn store(&self) -> ScheduleStore {
        self.store_with(Arc::new(InMemoryDispatcher::new()))
    }

    pub fn store_with(&self, dispatcher: Arc<dyn NotificationDispatcher>) -> ScheduleStore {
        ScheduleStore::open(&self.registry, &self.config, dispatcher)
    }
}

fn print_records(records: Vec<ScheduleRecord>) -> anyhow::Result<()> {
    let values: Vec<serde_json::Value> = records
        .into_iter()
        .map(|record| serde_json::Value::Object(record.into_fields()))
        .collect();
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}
