//! # Meili Client
//!
//! Thin client for the two Meilisearch endpoints the exporter reads:
//! the health check and the global statistics.
//!
//! ```rust,no_run
//! use meili_client::{MeiliClient, StatsSource};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MeiliClient::builder()
//!         .base_url("http://localhost:7700")
//!         .api_key(Some("masterKey".to_string()))
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     if client.check_health().await {
//!         let stats = client.fetch_stats().await?;
//!         println!("{} indexes", stats.indexes.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod models;

pub use client::{MeiliClient, MeiliClientBuilder, DEFAULT_TIMEOUT};
pub use error::{ClientError, Result};
pub use models::{IndexStats, StatsSnapshot};

use async_trait::async_trait;

/// Source of upstream statistics consumed on every scrape.
///
/// All network I/O towards the search engine sits behind this trait.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// True iff the upstream answers its health check within the timeout.
    /// Failures are folded into `false`.
    async fn check_health(&self) -> bool;

    /// Fetch global and per-index statistics.
    async fn fetch_stats(&self) -> Result<StatsSnapshot>;
}
