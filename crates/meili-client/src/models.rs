//! Response models for the Meilisearch stats API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Global and per-index statistics returned by `GET /stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Size of the database in bytes
    pub database_size: u64,
    /// Time of the last update, `None` when nothing was ever written
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    /// Statistics keyed by index uid
    #[serde(default)]
    pub indexes: HashMap<String, IndexStats>,
}

impl StatsSnapshot {
    /// Last update as Unix epoch seconds, 0 when the upstream reports none
    pub fn last_update_epoch(&self) -> i64 {
        self.last_update.map(|ts| ts.timestamp()).unwrap_or(0)
    }
}

/// Statistics of a single index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_documents: u64,
    /// True while documents are still being processed
    pub is_indexing: bool,
    #[serde(default)]
    pub field_distribution: HashMap<String, u64>,
}
