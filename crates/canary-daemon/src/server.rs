//! Server setup and lifecycle management

use std::sync::Arc;

use canary_engine::{Canary, Collaborators, ProbeContext};
use canary_metrics::MetricSink;
use tokio::net::TcpListener;

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};

/// Canary daemon server
pub struct Server {
    config: DaemonConfig,
    canary: Canary,
}

impl Server {
    /// Create a server talking to the configured platform
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let clients = Collaborators::from_config(&config.clients)?;
        let metrics = Arc::new(MetricSink::new()?);
        let canary = Canary::new(ProbeContext::new(clients, metrics, config.canary.clone()));

        Ok(Self { config, canary })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.canary.clone());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Canary daemon listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        if self.canary.is_running() {
            tracing::warn!("Shutting down with a canary cycle in progress");
        }
        tracing::info!("Canary daemon shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
