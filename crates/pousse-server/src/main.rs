//! poussetaches server binary
//!
//! Wires the engine, the worker pool and the admission API together and
//! runs until SIGINT/SIGTERM, then drains the workers before exiting.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use pousse_api::server::{serve, ServerConfig};
use pousse_core::{Engine, EngineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    pousse_api::server::init_tracing();

    let engine_config = EngineConfig::from_env();
    if engine_config.auth_key.is_empty() {
        tracing::warn!(
            "{} is not set, callbacks will carry an empty auth header",
            pousse_core::config::AUTH_KEY_ENV
        );
    }
    let server_config = ServerConfig::from_env();

    let engine = Arc::new(Engine::open(engine_config).await?);
    engine.recover().await?;

    let shutdown = CancellationToken::new();
    let workers = pousse_core::worker::spawn(engine.clone(), shutdown.clone());
    let server = tokio::spawn(serve(engine.clone(), server_config, shutdown.clone()));

    shutdown_signal().await;
    tracing::info!("shutting down");
    shutdown.cancel();

    // Workers finish their current attempt; the server drains open
    // connections.
    for handle in workers {
        handle.await?;
    }
    server.await??;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM");
        }
    }
}
