//! Prometheus collector for Meilisearch
//!
//! Translates the statistics returned by a [`meili_client::StatsSource`]
//! into the `meilisearch_*` metric families.

pub mod collector;
pub mod error;
pub mod metrics;

pub use collector::{MeilisearchCollector, CONTENT_TYPE};
pub use error::{CollectorError, Result};
pub use metrics::{ExporterMetrics, IndexMetrics, INDEX_LABEL, NAMESPACE};
