//! Scrape collector
//!
//! Each call to [`MeilisearchCollector::collect`] performs one scrape: check
//! health, fetch statistics, update the long-lived gauges and build the
//! per-index series. Upstream failures never fail the scrape, they degrade
//! to `up = 0` and stale gauges.

use std::sync::Arc;
use std::time::Instant;

use meili_client::{StatsSnapshot, StatsSource};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, instrument};

use crate::error::Result;
use crate::metrics::{ExporterMetrics, IndexMetrics};

/// Content type of the rendered exposition
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

pub struct MeilisearchCollector {
    source: Arc<dyn StatsSource>,
    metrics: ExporterMetrics,
}

impl MeilisearchCollector {
    /// Create a collector with freshly registered instruments
    pub fn new(source: Arc<dyn StatsSource>) -> Result<Self> {
        Ok(Self::with_metrics(source, ExporterMetrics::new()?))
    }

    pub fn with_metrics(source: Arc<dyn StatsSource>, metrics: ExporterMetrics) -> Self {
        Self { source, metrics }
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Perform one scrape and return every metric family to expose.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let start = Instant::now();
        self.metrics.total_scrapes.inc();

        let healthy = self.source.check_health().await;
        self.metrics.up.set(if healthy { 1.0 } else { 0.0 });

        let index_families = match self.source.fetch_stats().await {
            Ok(stats) => self.record(&stats),
            Err(e) => {
                error!(error = %e, "Failed to fetch statistics");
                Vec::new()
            }
        };

        let mut families = self.metrics.gather();
        families.extend(index_families);

        debug!(
            healthy,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Scrape finished"
        );
        families
    }

    /// Perform one scrape and encode it in the Prometheus text format
    pub async fn render(&self) -> Result<String> {
        let families = self.collect().await;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn record(&self, stats: &StatsSnapshot) -> Vec<MetricFamily> {
        self.metrics.last_update.set(stats.last_update_epoch() as f64);
        self.metrics.database_size.set(stats.database_size as f64);

        let mut index_metrics = match IndexMetrics::new() {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "Failed to create index metrics");
                return Vec::new();
            }
        };

        for (name, index) in &stats.indexes {
            if let Err(e) = index_metrics.observe(name, index.number_of_documents, index.is_indexing) {
                error!(error = %e, index = %name, "Failed to record index metrics");
            }
        }

        index_metrics.into_families()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use meili_client::{ClientError, IndexStats};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory upstream whose answers can be changed between scrapes
    #[derive(Default)]
    struct FakeSource {
        healthy: AtomicBool,
        stats: Mutex<Option<StatsSnapshot>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeSource {
        fn new(healthy: bool, stats: Option<StatsSnapshot>) -> Arc<Self> {
            let source = Self::default();
            source.healthy.store(healthy, Ordering::SeqCst);
            *source.stats.lock().unwrap() = stats;
            Arc::new(source)
        }

        fn set(&self, healthy: bool, stats: Option<StatsSnapshot>) {
            self.healthy.store(healthy, Ordering::SeqCst);
            *self.stats.lock().unwrap() = stats;
        }
    }

    #[async_trait]
    impl StatsSource for FakeSource {
        async fn check_health(&self) -> bool {
            self.calls.lock().unwrap().push("health");
            self.healthy.load(Ordering::SeqCst)
        }

        async fn fetch_stats(&self) -> meili_client::Result<StatsSnapshot> {
            self.calls.lock().unwrap().push("stats");
            self.stats.lock().unwrap().clone().ok_or(ClientError::Api {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    fn snapshot(last_update: Option<i64>, size: u64, indexes: &[(&str, u64, bool)]) -> StatsSnapshot {
        StatsSnapshot {
            database_size: size,
            last_update: last_update.map(|ts| Utc.timestamp_opt(ts, 0).unwrap()),
            indexes: indexes
                .iter()
                .map(|(name, docs, indexing)| {
                    (
                        name.to_string(),
                        IndexStats {
                            number_of_documents: *docs,
                            is_indexing: *indexing,
                            field_distribution: HashMap::new(),
                        },
                    )
                })
                .collect(),
        }
    }

    fn collector(source: Arc<FakeSource>) -> MeilisearchCollector {
        MeilisearchCollector::new(source).unwrap()
    }

    fn count_series(output: &str, name: &str) -> usize {
        output
            .lines()
            .filter(|line| line.starts_with(&format!("{}{{", name)))
            .count()
    }

    #[tokio::test]
    async fn test_healthy_empty_instance() {
        let source = FakeSource::new(true, Some(snapshot(None, 0, &[])));
        let output = collector(source).render().await.unwrap();

        assert!(output.contains("meilisearch_up 1\n"));
        assert!(output.contains("meilisearch_last_update 0\n"));
        assert!(output.contains("meilisearch_database_size 0\n"));
        assert!(output.contains("meilisearch_total_scrapes 1\n"));
        assert!(!output.contains("meilisearch_number_of_documents"));
        assert!(!output.contains("meilisearch_is_indexing"));
    }

    #[tokio::test]
    async fn test_healthy_single_index() {
        let ts = 1_622_548_800;
        let source = FakeSource::new(true, Some(snapshot(Some(ts), 4096, &[("movies", 500, false)])));
        let output = collector(source).render().await.unwrap();

        assert!(output.contains("meilisearch_up 1\n"));
        assert!(output.contains("meilisearch_last_update 1622548800\n"));
        assert!(output.contains("meilisearch_database_size 4096\n"));
        assert!(output.contains("meilisearch_number_of_documents{index=\"movies\"} 500\n"));
        assert!(output.contains("meilisearch_is_indexing{index=\"movies\"} 0\n"));
    }

    #[tokio::test]
    async fn test_unreachable_on_first_scrape() {
        let source = FakeSource::new(false, None);
        let output = collector(source).render().await.unwrap();

        assert!(output.contains("meilisearch_up 0\n"));
        assert!(output.contains("meilisearch_total_scrapes 1\n"));
        assert!(output.contains("meilisearch_last_update 0\n"));
        assert!(output.contains("meilisearch_database_size 0\n"));
        assert_eq!(count_series(&output, "meilisearch_number_of_documents"), 0);
        assert_eq!(count_series(&output, "meilisearch_is_indexing"), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_values() {
        let source = FakeSource::new(true, Some(snapshot(Some(1_000), 2048, &[("movies", 10, false)])));
        let collector = collector(source.clone());
        collector.render().await.unwrap();

        source.set(false, None);
        let output = collector.render().await.unwrap();

        assert!(output.contains("meilisearch_up 0\n"));
        assert!(output.contains("meilisearch_total_scrapes 2\n"));
        assert!(output.contains("meilisearch_last_update 1000\n"));
        assert!(output.contains("meilisearch_database_size 2048\n"));
        assert!(!output.contains("meilisearch_number_of_documents"));
    }

    #[tokio::test]
    async fn test_mixed_indexing_states() {
        let source = FakeSource::new(true, Some(snapshot(None, 1, &[("a", 3, true), ("b", 7, false)])));
        let output = collector(source).render().await.unwrap();

        assert!(output.contains("meilisearch_is_indexing{index=\"a\"} 1\n"));
        assert!(output.contains("meilisearch_is_indexing{index=\"b\"} 0\n"));
        assert!(output.contains("meilisearch_number_of_documents{index=\"a\"} 3\n"));
        assert!(output.contains("meilisearch_number_of_documents{index=\"b\"} 7\n"));
        assert_eq!(count_series(&output, "meilisearch_number_of_documents"), 2);
        assert_eq!(count_series(&output, "meilisearch_is_indexing"), 2);
    }

    #[tokio::test]
    async fn test_counter_increments_once_per_scrape() {
        let source = FakeSource::new(true, Some(snapshot(None, 0, &[])));
        let collector = collector(source.clone());

        for expected in 1..=3 {
            collector.collect().await;
            assert_eq!(collector.metrics().total_scrapes.get(), expected);
        }

        source.set(false, None);
        collector.collect().await;
        assert_eq!(collector.metrics().total_scrapes.get(), 4);
    }

    #[tokio::test]
    async fn test_unhealthy_but_stats_available() {
        let source = FakeSource::new(false, Some(snapshot(Some(42), 8, &[("movies", 1, false)])));
        let collector = collector(source);
        let output = collector.render().await.unwrap();

        assert!(output.contains("meilisearch_up 0\n"));
        assert!(output.contains("meilisearch_last_update 42\n"));
        assert_eq!(count_series(&output, "meilisearch_number_of_documents"), 1);
    }

    #[tokio::test]
    async fn test_removed_index_is_not_emitted() {
        let source = FakeSource::new(true, Some(snapshot(None, 0, &[("a", 1, false), ("b", 2, false)])));
        let collector = collector(source.clone());
        collector.render().await.unwrap();

        source.set(true, Some(snapshot(None, 0, &[("b", 5, false)])));
        let output = collector.render().await.unwrap();

        assert!(!output.contains("index=\"a\""));
        assert!(output.contains("meilisearch_number_of_documents{index=\"b\"} 5\n"));
    }

    #[tokio::test]
    async fn test_health_checked_before_stats() {
        let source = FakeSource::new(true, Some(snapshot(None, 0, &[])));
        let collector = collector(source.clone());
        collector.collect().await;
        collector.collect().await;

        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["health", "stats", "health", "stats"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_scrapes() {
        let source = FakeSource::new(true, Some(snapshot(None, 0, &[("movies", 500, false)])));
        let collector = Arc::new(collector(source));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let collector = collector.clone();
                tokio::spawn(async move { collector.render().await.unwrap() })
            })
            .collect();

        for handle in handles {
            let output = handle.await.unwrap();
            assert_eq!(count_series(&output, "meilisearch_number_of_documents"), 1);
            assert_eq!(count_series(&output, "meilisearch_is_indexing"), 1);
        }

        assert_eq!(collector.metrics().total_scrapes.get(), 8);
    }
}
