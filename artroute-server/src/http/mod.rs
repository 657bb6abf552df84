//! HTTP ingestion: the analysis endpoint and a liveness probe.

pub mod errors;
pub mod handlers;

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use artroute_config::ServerConfig;
use artroute_core::AnalysisClient;
use artroute_model::api::ANALYZE_PATH;
use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::tls::create_tls_acceptor;

/// How long in-flight connections get to finish once shutdown starts.
const TLS_DRAIN_PERIOD: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct AppState {
    pub client: AnalysisClient,
}

impl AppState {
    pub fn new(client: AnalysisClient) -> Self {
        Self { client }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(ANALYZE_PATH, post(handlers::analyze_artifact))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves `router` until `shutdown` fires, over TLS when configured.
pub async fn serve(
    server: &ServerConfig,
    router: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = server
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", server.bind_address()))?;

    match &server.tls {
        Some(tls) => {
            info!(
                target: "artroute::http",
                %addr,
                cert = %tls.cert_path.display(),
                key = %tls.key_path.display(),
                "starting HTTPS ingestion server"
            );
            let rustls_config = create_tls_acceptor(tls)
                .await
                .context("failed to load TLS certificates")?;

            let handle: axum_server::Handle<SocketAddr> = axum_server::Handle::new();
            let watcher = handle.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                watcher.graceful_shutdown(Some(TLS_DRAIN_PERIOD));
            });

            axum_server::bind_rustls(addr, rustls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            info!(target: "artroute::http", %addr, "starting HTTP ingestion server");
            warn!(
                target: "artroute::http",
                "TLS is not configured. Set TLS_CERT_PATH and TLS_KEY_PATH to serve HTTPS."
            );
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
                .await
                .context("HTTP server failed")?;
        }
    }

    info!(target: "artroute::http", "ingestion server stopped");
    Ok(())
}
