//! # artroute
//!
//! Routes artifact notifications to analysis pipelines.
//!
//! Requests arrive over HTTP(S) or from an SQS queue and are handed to a
//! single dispatcher. For each one the dispatcher resolves the artifact's
//! media type in its registry, evaluates the namespace's routing rules, and
//! creates one pipeline per matching rule through the Kubernetes API.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use artroute_config::{
    Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions, SqsConfig, TlsConfig,
};
use artroute_core::{Dispatcher, analysis_bus};
use artroute_server::{
    http::{AppState, create_app, serve},
    listeners::{QueueListener, SqsQueue},
    startup::build_ports,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "artroute")]
#[command(about = "Routes artifact notifications to analysis pipelines by media type")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "ARTROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Path to TLS certificate file (PEM format)
    #[arg(long, env = "TLS_CERT_PATH", requires = "key")]
    cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long, env = "TLS_KEY_PATH", requires = "cert")]
    key: Option<PathBuf>,

    /// SQS queue to poll for analysis requests (enables the queue listener)
    #[arg(long, env = "SQS_QUEUE_URL")]
    sqs_queue_url: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = self.host.clone() {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let (Some(cert_path), Some(key_path)) = (self.cert.clone(), self.key.clone()) {
            config.server.tls = Some(TlsConfig {
                cert_path,
                key_path,
            });
        }
        if let Some(queue_url) = self.sqs_queue_url.clone() {
            match config.sqs.as_mut() {
                Some(sqs) => sqs.queue_url = queue_url,
                None => config.sqs = Some(SqsConfig::new(queue_url)),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;
    cli.apply(&mut config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "info,artroute_server=info,artroute_core=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    let ports = build_ports(&config).context("failed to initialise adapters")?;
    let (client, inbox) = analysis_bus();
    let shutdown = CancellationToken::new();

    let dispatcher = tokio::spawn(Dispatcher::new(inbox, ports).run(shutdown.clone()));

    let listener = match &config.sqs {
        Some(sqs) => {
            info!(
                queue_url = %sqs.queue_url,
                region = ?sqs.region,
                endpoint = ?sqs.endpoint,
                "SQS queue listener enabled"
            );
            let queue = SqsQueue::connect(sqs).await;
            let listener =
                QueueListener::new(Arc::new(queue), client.clone(), sqs.error_backoff);
            Some(tokio::spawn(listener.run(shutdown.clone())))
        }
        None => {
            info!("no SQS queue configured; queue listener disabled");
            None
        }
    };

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let router = create_app(AppState::new(client));
    let served = serve(&config.server, router, shutdown.clone()).await;
    if let Err(err) = &served {
        error!(error = %err, "ingestion server exited with an error");
    }
    shutdown.cancel();

    if let Some(listener) = listener {
        listener.await.context("queue listener task failed")?;
    }
    let reason = dispatcher.await.context("dispatcher task failed")?;
    info!(%reason, "artroute stopped");

    served
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = shutdown.cancelled() => return,
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    shutdown.cancel();
}
