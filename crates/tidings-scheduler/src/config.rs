//! tidings.toml configuration parser.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidings_state::{RedbSubstrate, Substrate};

use crate::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tag of the container holding schedule records.
    pub schedule_tag: String,
    /// Tag of the container holding the pending index.
    pub pending_tag: String,
    /// Key of the pending index record inside `pending_tag`.
    pub pending_key: String,
    /// Upper bound for blocking reconciliation callers.
    pub sync_timeout_secs: u64,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Absent means an in-memory store.
    pub path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_tag: "NotificationSchedule".to_string(),
            pending_tag: "PendingSchedules".to_string(),
            pending_key: "pending".to_string(),
            sync_timeout_secs: 30,
            storage: StorageConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> SchedulerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SchedulerResult<Self> {
        let config: SchedulerConfig =
            toml::from_str(content).map_err(|e| SchedulerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SchedulerResult<String> {
        toml::to_string_pretty(self).map_err(|e| SchedulerError::Config(e.to_string()))
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Open the substrate described by `[storage]`.
    pub fn open_substrate(&self) -> SchedulerResult<Arc<dyn Substrate>> {
        let substrate = match &self.storage.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                RedbSubstrate::open(path)?
            }
            None => RedbSubstrate::open_in_memory()?,
        };
        Ok(Arc::new(substrate))
    }

    fn validate(&self) -> SchedulerResult<()> {
        if self.schedule_tag.is_empty() || self.pending_tag.is_empty() {
            return Err(SchedulerError::Config("tags must not be empty".to_string()));
        }
        if self.schedule_tag == self.pending_tag {
            return Err(SchedulerError::Config(
                "schedule_tag and pending_tag must differ".to_string(),
            ));
        }
        if self.pending_key.is_empty() {
            return Err(SchedulerError::Config("pending_key must not be empty".to_string()));
        }
        Ok(())
    }
}
