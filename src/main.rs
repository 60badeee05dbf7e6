//! Stats Cache - statistics REST endpoint plus a clustered cache node
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load configuration (optional TOML file, then environment)
//! 3. Start the cache node: bind, then join or form the cluster
//! 4. Wire the statistics service onto the data-access layer
//! 5. Start the HTTP server
//! 6. On SIGINT/SIGTERM drain HTTP requests and stop the cache node

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stats_cache::{create_router, AppState, CacheNode, Config, InMemoryDataAccess, NodeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stats_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stats Cache");

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: http_port={}, cache_listen_addr={}, seeds={:?}, cache_name={}",
        config.http_port, config.cache_listen_addr, config.cache_seeds, config.cache_name
    );

    let node = CacheNode::new(NodeConfig::from(&config));
    let node_handle = node
        .start()
        .await
        .context("Cache node failed to start")?;

    let dal = Arc::new(InMemoryDataAccess::new());
    let app = create_router(AppState::in_memory(dal));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            if let Err(stop_err) = node_handle.shutdown().await {
                warn!("Cache node did not stop cleanly: {}", stop_err);
            }
            return Err(e).with_context(|| format!("Failed to bind HTTP listener on {}", addr));
        }
    };
    info!("Statistics API listening on http://{}", addr);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let drain_signal = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { drain_signal.cancelled().await });
    let mut server_task = tokio::spawn(async move { server.await });

    let server_result = tokio::select! {
        result = &mut server_task => Some(result),
        _ = shutdown.cancelled() => None,
    };

    let server_result = match server_result {
        Some(result) => result,
        None => match tokio::time::timeout(config.shutdown_grace(), &mut server_task).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "HTTP requests still in flight after {} ms, aborting",
                    config.shutdown_grace_ms
                );
                server_task.abort();
                Ok(Ok(()))
            }
        },
    };

    node_handle
        .shutdown()
        .await
        .context("Cache node failed to stop")?;

    match server_result {
        Ok(Ok(())) => {
            info!("Server shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("HTTP server failed: {}", e);
            Err(e).context("HTTP server failed")
        }
        Err(e) => Err(e).context("HTTP server task panicked"),
    }
}

/// Waits for Ctrl+C or SIGTERM, then cancels `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    shutdown.cancel();
}
