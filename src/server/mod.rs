//! HTTP front of the sync service
//!
//! [`Server`] owns the process lifecycle: the registered sync jobs are
//! scheduled once the listener is bound and stopped again when serving
//! ends, whether it ended cleanly or not.

pub mod middleware;
pub mod router;

pub use middleware::{classify_path, request_middleware, RouteKind};
pub use router::{build_router, ApiError, AppState, EventAccepted, HealthResponse};

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;

/// Router with the request span and access log applied
pub fn build_app(state: AppState) -> Router {
    build_router(state)
        .layer(axum::middleware::from_fn(request_middleware))
        .layer(TraceLayer::new_for_http())
}

/// A bound listener plus the state it serves
pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    /// Bind `host:port`; the host may be a name or an address
    pub async fn bind(config: &ServerConfig, state: AppState) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{}:{}", config.host, config.port),
                source,
            })?;

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Serve)
    }

    /// Schedule every sync, serve until `shutdown` resolves, then stop them
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.local_addr()?;
        let registry = self.state.registry.clone();
        let app = build_app(self.state);

        registry.schedule_all();
        info!(addr = %addr, syncs = registry.len(), "Server listening");

        let served = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        registry.stop_all();
        info!("Scheduled syncs stopped");

        served.map_err(ServerError::Serve)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
