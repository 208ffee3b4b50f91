use crate::{create_router, AppState};
use metatools_core::{Result, Settings};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub async fn new(addr: SocketAddr, settings: &Settings) -> Result<Self> {
        let state = AppState::from_settings(settings).await?;
        Ok(Self { state, addr })
    }

    pub fn with_state(addr: SocketAddr, state: AppState) -> Self {
        Self { state, addr }
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        info!("Starting AIND tools server on {}", self.addr);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("Server listening on http://{}", self.addr);
        info!("Available tools:");
        info!("  /query_tool - DocDB query tool");
        info!("  /fiber_schematic_viewer - fiber schematic viewer");
        info!("  /upgrader - metadata upgrader tool");
        info!("  GET /health - health check");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
