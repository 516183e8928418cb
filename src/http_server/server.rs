//! # HTTP Server
//!
//! Combines the health check and the backup API into one router and serves
//! it until the shutdown token fires.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::backup_routes::{backup_routes, BackupState};
use super::config::HttpServerConfig;
use super::health_routes::health_routes;
use crate::backup::BackupEngine;

/// HTTP server for the Smarticky backup API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server around a shared engine
    pub fn new(config: HttpServerConfig, engine: Arc<BackupEngine>) -> Self {
        let router = Self::build_router(&config, engine);
        Self { config, router }
    }

    fn build_router(config: &HttpServerConfig, engine: Arc<BackupEngine>) -> Router {
        let backup_state = Arc::new(BackupState::new(engine));

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes())
            .nest("/api", backup_routes(backup_state))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    pub async fn start(self, shutdown: CancellationToken) -> io::Result<()> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid listen address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "backup API listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("backup API stopped");
        Ok(())
    }
}
