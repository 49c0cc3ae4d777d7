//! `lineage-session` -- headless lineage graph session.
//!
//! Mirrors one space over the sync WebSocket, keeps a laid-out view of it
//! current and logs every published layout. See
//! [`SessionConfig::from_env`](lineage_session::config::SessionConfig::from_env)
//! for the environment variables it reads.

use lineage_session::config::{LogFormat, SessionConfig};
use lineage_session::controller::SessionController;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = SessionConfig::from_env();
    let log_format = config
        .as_ref()
        .map(|c| c.log_format)
        .unwrap_or_default();
    init_tracing(log_format);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        ws_url = %config.ws_url,
        space_id = %config.space_id,
        view = ?config.view,
        algorithm = %config.layout.algorithm,
        "Starting lineage-session",
    );

    let controller = SessionController::from_config(&config).await;
    let mut layouts = controller.layout();
    let mut status = controller.sync().status();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = layouts.changed() => {
                if changed.is_err() {
                    break;
                }
                let layout = layouts.borrow_and_update().clone();
                let bounds = layout.bounds();
                tracing::info!(
                    nodes = layout.nodes.len(),
                    edges = layout.edges.len(),
                    width = bounds.map_or(0.0, |b| b.width),
                    height = bounds.map_or(0.0, |b| b.height),
                    "Layout updated",
                );
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                tracing::info!(status = ?current, "Connection status");
                if current.is_terminal() {
                    tracing::error!("Sync connection is not coming back, exiting");
                    controller.shutdown().await;
                    std::process::exit(1);
                }
            }
        }
    }

    controller.shutdown().await;
    tracing::info!("Graceful shutdown complete");
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lineage_session=info,lineage_sync=info".into());

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
