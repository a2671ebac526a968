use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, SequencerError};

/// Priority assumed for items that do not carry one.
pub const DEFAULT_PRIORITY: i32 = 5;

/// A single unit of sequenced work.
///
/// Callers create items; the engine owns the processing metadata
/// (`is_processed`, `is_skipped`, the timestamps) once an item is handed to
/// [`Runner::initialize`](super::Runner::initialize).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(default = "new_id")]
    pub id: String,
    /// Higher runs first when the runner is priority based.
    #[serde(default)]
    pub priority: Option<i32>,
    /// Item-level skip override. `None` defers to the runner configuration.
    #[serde(default)]
    pub skipable: Option<bool>,
    #[serde(default)]
    pub is_processed: bool,
    #[serde(default)]
    pub is_skipped: bool,
    #[serde(default)]
    pub processing_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_end_time: Option<DateTime<Utc>>,
    /// Milliseconds before the item auto-completes when nothing else drives it.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for WorkItem {
    fn default() -> Self {
        Self {
            id: new_id(),
            priority: None,
            skipable: None,
            is_processed: false,
            is_skipped: false,
            processing_start_time: None,
            processing_end_time: None,
            duration: None,
            extra: Map::new(),
        }
    }
}

impl WorkItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_duration(mut self, millis: u64) -> Self {
        self.duration = Some(millis);
        self
    }

    pub fn with_skipable(mut self, skipable: bool) -> Self {
        self.skipable = Some(skipable);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    /// Human readable name: `label`, then `name`, then the id.
    pub fn label(&self) -> &str {
        ["label", "name"]
            .iter()
            .find_map(|key| self.extra.get(*key).and_then(Value::as_str))
            .unwrap_or(self.id.as_str())
    }
}

#[derive(Deserialize)]
struct ItemsDocument {
    #[serde(default)]
    items: Vec<WorkItem>,
}

/// Load work items from a JSON array or a TOML file with `[[items]]` tables.
pub fn load_items(path: &Path) -> Result<Vec<WorkItem>> {
    let contents = std::fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&contents)?),
        Some("toml") => Ok(toml::from_str::<ItemsDocument>(&contents)?.items),
        other => Err(SequencerError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}
