//! Command-line argument parsing

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "meilisearch-exporter",
    about = "Prometheus exporter for Meilisearch",
    version,
    long_about = "Polls the Meilisearch health and stats endpoints on every scrape \
                  and exposes them in the Prometheus text format."
)]
pub struct Args {
    /// Address on which to expose metrics and the landing page
    #[arg(
        long = "web.listen-address",
        env = "MEILISEARCH_EXPORTER_LISTEN_ADDRESS",
        default_value = ":9974"
    )]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(
        long = "web.telemetry-path",
        env = "MEILISEARCH_EXPORTER_TELEMETRY_PATH",
        default_value = "/metrics"
    )]
    pub telemetry_path: String,

    /// Path to a web configuration file enabling TLS or basic authentication
    #[arg(long = "web.config.file", env = "MEILISEARCH_EXPORTER_WEB_CONFIG")]
    pub web_config_file: Option<PathBuf>,

    /// Grace period for in-flight requests on shutdown
    #[arg(
        long = "web.shutdown-timeout",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub shutdown_timeout: Duration,

    /// HTTP API address of the Meilisearch host
    #[arg(
        long = "ms.uri",
        env = "MEILISEARCH_EXPORTER_URI",
        default_value = "http://localhost:7700"
    )]
    pub ms_uri: String,

    /// Meilisearch API key
    #[arg(
        long = "ms.apikey",
        env = "MEILISEARCH_EXPORTER_APIKEY",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub ms_api_key: String,

    /// Timeout for trying to get stats from Meilisearch
    #[arg(
        long = "ms.timeout",
        env = "MEILISEARCH_EXPORTER_TIMEOUT",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub ms_timeout: Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long = "log.level",
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Log output format
    #[arg(
        long = "log.format",
        env = "LOG_FORMAT",
        default_value = "logfmt",
        value_parser = ["logfmt", "json"]
    )]
    pub log_format: String,
}

impl Args {
    /// Validate the arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ms_uri.trim().is_empty() {
            bail!("ms.uri cannot be empty");
        }

        url::Url::parse(self.ms_uri.trim()).context("error parsing ms.uri")?;

        if !self.telemetry_path.starts_with('/') {
            bail!("web.telemetry-path must start with '/'");
        }
        if self.telemetry_path == "/" {
            bail!("web.telemetry-path cannot be '/', it is reserved for the landing page");
        }
        if self.telemetry_path.contains(['*', ':', '{', '}']) {
            bail!("web.telemetry-path cannot contain route parameters or wildcards");
        }

        if self.ms_timeout.is_zero() {
            bail!("ms.timeout must be greater than zero");
        }

        Ok(())
    }

    /// Listen address with an empty host expanded to all interfaces
    pub fn bind_address(&self) -> String {
        if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        }
    }

    /// API key, `None` when unauthenticated
    pub fn api_key(&self) -> Option<String> {
        let key = self.ms_api_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}
