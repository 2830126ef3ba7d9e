//! HTTP server with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use pousse_core::Engine;

use crate::routes::api_router;

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "POUSSETACHES_PORT";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: SocketAddr::from(([0, 0, 0, 0], 7991)) }
    }
}

impl ServerConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let port: u16 = std::env::var(PORT_ENV)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(7991);
        Self { addr: SocketAddr::from(([0, 0, 0, 0], port)) }
    }
}

/// Bind and serve the admission API until the token is cancelled.
pub async fn serve(
    engine: Arc<Engine>,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = api_router(engine).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "admission API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("admission API stopped");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pousse_core=debug,tower_http=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_published_port() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 7991);
    }
}
