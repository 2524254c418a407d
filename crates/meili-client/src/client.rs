//! Meilisearch HTTP client implementation

use crate::error::{ClientError, Result};
use crate::models::StatsSnapshot;
use crate::StatsSource;
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default timeout applied to every upstream request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the Meilisearch health and stats endpoints
#[derive(Clone)]
pub struct MeiliClient {
    http: Client,
    base_url: Url,
    api_key: Option<Secret<String>>,
    timeout: Duration,
}

impl std::fmt::Debug for MeiliClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeiliClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for creating a MeiliClient
#[derive(Default)]
pub struct MeiliClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl MeiliClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL of the Meilisearch instance
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the API key. An empty key means unauthenticated.
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a custom user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<MeiliClient> {
        let raw = self.base_url.unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ClientError::Config("base URL cannot be empty".to_string()));
        }

        let mut base_url = Url::parse(raw)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "unsupported URL scheme '{}'",
                base_url.scheme()
            )));
        }
        if base_url.cannot_be_a_base() || base_url.host().is_none() {
            return Err(ClientError::Config(format!("'{}' is not a valid base URL", raw)));
        }
        // Endpoints are joined relative to the base, keep any path prefix.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("meili-client/{}", env!("CARGO_PKG_VERSION")));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(ClientError::Http)?;

        Ok(MeiliClient {
            http,
            base_url,
            api_key: self.api_key.map(Secret::new),
            timeout,
        })
    }
}

impl MeiliClient {
    /// Create a new client builder
    pub fn builder() -> MeiliClientBuilder {
        MeiliClientBuilder::new()
    }

    /// Create a client with default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(ClientError::Url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key
            .as_ref()
            .map(|key| format!("Bearer {}", key.expose_secret()))
    }

    fn map_send_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Http(err)
        }
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let mut req = self.http.get(self.url(path)?);

        if let Some(auth) = self.auth_header() {
            req = req.header(header::AUTHORIZATION, auth);
        }

        req.send().await.map_err(|e| self.map_send_error(e))
    }

    async fn handle_response(&self, response: Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if status.is_success() {
            return Ok(body);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Unauthorized {
                status: status.as_u16(),
                message: body,
            }),
            _ => Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            }),
        }
    }

    /// Returns true iff `GET /health` answers with a success status in time
    pub async fn is_healthy(&self) -> bool {
        match self.get("health").await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Health check returned non-success status");
                false
            }
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Query `GET /stats`
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn stats(&self) -> Result<StatsSnapshot> {
        let response = self.get("stats").await?;
        let body = self.handle_response(response).await?;
        let stats: StatsSnapshot = serde_json::from_str(&body)?;
        debug!(indexes = stats.indexes.len(), "Fetched statistics");
        Ok(stats)
    }
}

#[async_trait]
impl StatsSource for MeiliClient {
    async fn check_health(&self) -> bool {
        self.is_healthy().await
    }

    async fn fetch_stats(&self) -> Result<StatsSnapshot> {
        self.stats().await
    }
}
