//! Prometheus instruments owned by the exporter
//!
//! The global instruments live for the whole process and are registered in
//! an explicit [`Registry`]. Per-index instruments are described here but
//! instantiated fresh on every scrape, see [`IndexMetrics`].

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, IntCounter, IntGaugeVec, Opts, Registry};

use crate::error::Result;

/// Metric namespace shared by every exported series
pub const NAMESPACE: &str = "meilisearch";

/// Label carrying the index uid on per-index series
pub const INDEX_LABEL: &str = "index";

/// Long-lived instruments, created once at startup
#[derive(Clone)]
pub struct ExporterMetrics {
    registry: Registry,
    /// 1 when the instance passed its health check on the last scrape
    pub up: Gauge,
    /// Unix time of the last database update, 0 when never updated
    pub last_update: Gauge,
    /// Database size in bytes
    pub database_size: Gauge,
    /// Scrapes performed since startup
    pub total_scrapes: IntCounter,
}

impl ExporterMetrics {
    /// Create the instruments and register them in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let up = Gauge::with_opts(opts("up", "Meilisearch instance is up and running"))?;
        let last_update = Gauge::with_opts(opts(
            "last_update",
            "When the last update was made to the database",
        ))?;
        let database_size =
            Gauge::with_opts(opts("database_size", "Size of the database in bytes"))?;
        let total_scrapes =
            IntCounter::with_opts(opts("total_scrapes", "Total of Meilisearch scrapes."))?;

        let build_info = IntGaugeVec::new(
            opts(
                "exporter_build_info",
                "A metric with a constant '1' value labeled by the exporter version.",
            ),
            &["version"],
        )?;
        build_info
            .get_metric_with_label_values(&[env!("CARGO_PKG_VERSION")])?
            .set(1);

        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(last_update.clone()))?;
        registry.register(Box::new(database_size.clone()))?;
        registry.register(Box::new(total_scrapes.clone()))?;
        registry.register(Box::new(build_info))?;

        Ok(Self {
            registry,
            up,
            last_update,
            database_size,
            total_scrapes,
        })
    }

    /// Snapshot of every registered instrument
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

/// Per-index gauges for a single scrape.
///
/// The index set changes between scrapes, so these are never shared: each
/// scrape fills its own pair and drops it once encoded.
pub struct IndexMetrics {
    number_of_documents: GaugeVec,
    is_indexing: GaugeVec,
    observed: usize,
}

impl IndexMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number_of_documents: GaugeVec::new(
                opts("number_of_documents", "Total number of documents"),
                &[INDEX_LABEL],
            )?,
            is_indexing: GaugeVec::new(
                opts(
                    "is_indexing",
                    "If 1, the index is still processing documents and attempts to search will \
                     result in undefined behavior. If 0, the index has finished processing and \
                     you can start searching",
                ),
                &[INDEX_LABEL],
            )?,
            observed: 0,
        })
    }

    /// Record one index
    pub fn observe(&mut self, index: &str, documents: u64, indexing: bool) -> Result<()> {
        self.number_of_documents
            .get_metric_with_label_values(&[index])?
            .set(documents as f64);
        self.is_indexing
            .get_metric_with_label_values(&[index])?
            .set(if indexing { 1.0 } else { 0.0 });
        self.observed += 1;
        Ok(())
    }

    /// Number of indexes observed so far
    pub fn len(&self) -> usize {
        self.observed
    }

    pub fn is_empty(&self) -> bool {
        self.observed == 0
    }

    /// Families for the observed indexes; empty when nothing was observed
    pub fn into_families(self) -> Vec<MetricFamily> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut families = self.number_of_documents.collect();
        families.extend(self.is_indexing.collect());
        families
    }
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE)
}
