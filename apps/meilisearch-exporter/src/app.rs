//! Application state and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use meili_client::MeiliClient;
use meili_collector::MeilisearchCollector;

use crate::cli::Args;
use crate::server::Server;
use crate::web_config::{BasicAuth, TlsServerConfig, WebConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Scrape collector, one `collect` per metrics request
    pub collector: Arc<MeilisearchCollector>,
    /// Path serving the metrics
    pub telemetry_path: String,
    /// Basic auth gate from the web config file
    pub basic_auth: Option<Arc<BasicAuth>>,
    /// Serve HTTPS with this certificate when set
    pub tls: Option<TlsServerConfig>,
}

impl AppState {
    /// Create the application state from validated arguments
    pub fn new(args: &Args) -> Result<Self> {
        info!("Initializing application components");

        let web_config = match &args.web_config_file {
            Some(path) => WebConfig::load(path)?,
            None => WebConfig::default(),
        };
        let basic_auth = web_config.basic_auth()?.map(Arc::new);
        if basic_auth.is_some() {
            info!("Basic authentication enabled");
        }
        if let Some(tls) = &web_config.tls_server_config {
            info!(cert = %tls.cert_file.display(), "TLS enabled");
        }

        let client = MeiliClient::builder()
            .base_url(args.ms_uri.trim())
            .api_key(args.api_key())
            .timeout(args.ms_timeout)
            .user_agent(format!("meilisearch-exporter/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create Meilisearch client")?;

        info!(
            uri = %client.base_url(),
            timeout = ?client.timeout(),
            authenticated = args.api_key().is_some(),
            "Meilisearch client configured"
        );

        let collector = MeilisearchCollector::new(Arc::new(client))
            .context("Failed to register metrics")?;

        Ok(Self {
            collector: Arc::new(collector),
            telemetry_path: args.telemetry_path.clone(),
            basic_auth,
            tls: web_config.tls_server_config,
        })
    }
}

/// Main application
pub struct App {
    args: Args,
    state: AppState,
}

impl App {
    /// Build the application with all dependencies
    pub fn build(args: Args) -> Result<Self> {
        args.validate()
            .context("Invalid command line arguments")?;

        let state = AppState::new(&args)?;

        Ok(Self { args, state })
    }

    /// Run the application until a shutdown signal is received
    pub async fn run(self) -> Result<()> {
        let server = Server::new(self.args, self.state);
        server.run().await
    }
}
