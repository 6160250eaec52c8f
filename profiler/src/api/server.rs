//! API server for the visitor profiler

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::pipeline::Profiler;

use super::routes::{answer, health_check, start, AppState};

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl From<&ServerConfig> for ApiServerConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    profiler: Arc<Profiler>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, profiler: Arc<Profiler>) -> Self {
        Self { config, profiler }
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            profiler: self.profiler.clone(),
        });

        Router::new()
            .route("/health", get(health_check))
            .route("/api/start", post(start))
            .route("/api/answer", post(answer))
            .with_state(app_state)
    }

    /// Bind the configured address and serve until the process exits
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!("Starting API server on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
