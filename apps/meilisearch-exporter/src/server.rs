//! HTTP Server implementation

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use meili_collector::CONTENT_TYPE;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::AppState;
use crate::cli::Args;
use crate::web_config::require_basic_auth;

/// Extra time for the serve task to return once connections are force closed
const DRAIN_MARGIN: Duration = Duration::from_secs(1);

pub struct Server {
    args: Args,
    state: AppState,
}

impl Server {
    pub fn new(args: Args, state: AppState) -> Self {
        Self { args, state }
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.args.bind_address();
        let grace = self.args.shutdown_timeout;
        let tls = self.state.tls.clone();
        let app = build_router(self.state);

        let listener = std::net::TcpListener::bind(&addr)
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
        listener
            .set_nonblocking(true)
            .context("Failed to configure HTTP listener")?;

        let handle = Handle::new();
        let service = app.into_make_service();
        let mut server = match tls {
            Some(tls) => {
                let config = RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to load TLS certificate {} and key {}",
                            tls.cert_file.display(),
                            tls.key_file.display()
                        )
                    })?;

                info!(address = %addr, path = %self.args.telemetry_path, "HTTPS server listening");
                tokio::spawn(
                    axum_server::from_tcp_rustls(listener, config)
                        .handle(handle.clone())
                        .serve(service),
                )
            }
            None => {
                info!(address = %addr, path = %self.args.telemetry_path, "HTTP server listening");
                tokio::spawn(axum_server::from_tcp(listener).handle(handle.clone()).serve(service))
            }
        };

        tokio::select! {
            result = &mut server => {
                return result
                    .context("HTTP server task failed")?
                    .context("HTTP server error");
            }
            _ = shutdown_signal() => {}
        }

        info!(grace = ?grace, "Shutting down");
        handle.graceful_shutdown(Some(grace));

        wait_for_drain(server, grace + DRAIN_MARGIN).await
    }
}

async fn wait_for_drain(
    server: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<()> {
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result
            .context("HTTP server task failed")?
            .context("HTTP server error"),
        Err(_) => {
            warn!(grace = ?grace, "Grace period elapsed, dropping in-flight requests");
            Ok(())
        }
    }
}

/// Build the HTTP router: metrics endpoint, landing page on every other path
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(landing_page))
        .route(&state.telemetry_path, get(metrics))
        .fallback(landing_page);

    if let Some(auth) = state.basic_auth.clone() {
        router = router.layer(middleware::from_fn_with_state(auth, require_basic_auth));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// Route handlers

async fn landing_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
  <head><title>Meilisearch Exporter</title></head>
  <body>
  <h1>Meilisearch Exporter</h1>
  <p><a href="{}">Metrics</a></p>
  </body>
</html>"#,
        state.telemetry_path
    ))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.collector.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
