//! Web configuration file and HTTP basic authentication
//!
//! The file follows the Prometheus exporter-toolkit layout:
//!
//! ```yaml
//! tls_server_config:
//!   cert_file: server.crt
//!   key_file: server.key
//! basic_auth_users:
//!   prometheus: $2y$10$...
//! ```
//!
//! Relative certificate paths are resolved against the directory holding the file.

use anyhow::{bail, Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    /// Username to bcrypt hash
    #[serde(default)]
    pub basic_auth_users: HashMap<String, String>,

    #[serde(default)]
    pub tls_server_config: Option<TlsServerConfig>,
}

/// Certificate and private key served over HTTPS, both PEM encoded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl TlsServerConfig {
    fn resolve_relative_to(&mut self, dir: &Path) {
        if self.cert_file.is_relative() {
            self.cert_file = dir.join(&self.cert_file);
        }
        if self.key_file.is_relative() {
            self.key_file = dir.join(&self.key_file);
        }
    }
}

impl WebConfig {
    /// Load and validate a web configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read web config file {}", path.display()))?;

        let mut config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid web config file {}", path.display()))?;

        if let (Some(tls), Some(dir)) = (config.tls_server_config.as_mut(), path.parent()) {
            tls.resolve_relative_to(dir);
        }

        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty file is a valid, empty configuration.
        let config: WebConfig = if contents.trim().is_empty() {
            WebConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML")?
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(tls) = &self.tls_server_config {
            if tls.cert_file.as_os_str().is_empty() {
                bail!("tls_server_config.cert_file cannot be empty");
            }
            if tls.key_file.as_os_str().is_empty() {
                bail!("tls_server_config.key_file cannot be empty");
            }
        }

        for (user, hash) in &self.basic_auth_users {
            if user.is_empty() {
                bail!("basic_auth_users contains an empty username");
            }
            bcrypt::verify("", hash)
                .with_context(|| format!("Invalid bcrypt hash for user '{}'", user))?;
        }

        Ok(())
    }

    /// Basic auth gate, `None` when no users are configured
    pub fn basic_auth(&self) -> Result<Option<BasicAuth>> {
        if self.basic_auth_users.is_empty() {
            Ok(None)
        } else {
            BasicAuth::new(self.basic_auth_users.clone()).map(Some)
        }
    }
}

/// Verifies basic auth credentials against bcrypt hashes
#[derive(Debug, Clone)]
pub struct BasicAuth {
    users: HashMap<String, String>,
    /// Checked for unknown users so a miss costs as much as a wrong password
    dummy_hash: String,
}

impl BasicAuth {
    pub fn new(users: HashMap<String, String>) -> Result<Self> {
        let mut cost = None;
        for (user, hash) in &users {
            let parts: bcrypt::HashParts = hash
                .parse()
                .with_context(|| format!("Invalid bcrypt hash for user '{}'", user))?;
            cost = cost.max(Some(parts.get_cost()));
        }
        let cost = cost.unwrap_or(bcrypt::DEFAULT_COST);
        let dummy_hash = bcrypt::hash("", cost).context("Failed to prepare bcrypt hash")?;

        Ok(Self { users, dummy_hash })
    }

    pub async fn verify(&self, user: &str, password: &str) -> bool {
        let (hash, known) = match self.users.get(user) {
            Some(hash) => (hash.clone(), true),
            None => (self.dummy_hash.clone(), false),
        };
        let password = password.to_string();

        // bcrypt verification is CPU bound, run it on the blocking pool.
        match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
            Ok(Ok(valid)) => valid && known,
            Ok(Err(e)) => {
                warn!(error = %e, user, "bcrypt verification failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "bcrypt verification task failed");
                false
            }
        }
    }
}

/// Extract `(user, password)` from an `Authorization: Basic` header value
pub fn parse_basic_credentials(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Middleware rejecting requests without valid basic auth credentials
pub async fn require_basic_auth(
    State(auth): State<Arc<BasicAuth>>,
    request: Request,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_credentials);

    if let Some((user, password)) = credentials {
        if auth.verify(&user, &password).await {
            return next.run(request).await;
        }
        debug!(user = %user, "Rejected basic auth credentials");
    }

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic")],
        "Unauthorized",
    )
        .into_response()
}
