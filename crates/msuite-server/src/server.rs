use std::sync::Arc;

use msuite_ingest::IngestPipeline;
use msuite_store::open_backend;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// MaterialSuite HTTP endpoint.
pub struct MsuiteServer {
    config: ServiceConfig,
    state: AppState,
}

impl MsuiteServer {
    /// Open the configured backend and assemble the ingest pipeline.
    pub fn new(config: ServiceConfig) -> ServerResult<Self> {
        let backend = open_backend(&config.backend)?;
        let pipeline = IngestPipeline::new(Arc::clone(&backend), &config.ingest)?;
        let state = AppState::new(pipeline, config.max_limit);
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            backend = self.state.backend.name(),
            "materialsuite endpoint listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use msuite_store::BackendConfig;

    fn in_memory() -> ServiceConfig {
        ServiceConfig {
            backend: BackendConfig::Document {
                blob_chunk_size: 16,
                root: None,
            },
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn server_construction() {
        let server = MsuiteServer::new(in_memory()).unwrap();
        assert_eq!(server.config().max_limit, 1000);
        assert_eq!(server.state().backend.name(), "document");
    }

    #[test]
    fn router_builds() {
        let server = MsuiteServer::new(in_memory()).unwrap();
        let _router = server.router();
    }

    #[test]
    fn bad_backend_config_fails_construction() {
        let config = ServiceConfig {
            backend: BackendConfig::Document {
                blob_chunk_size: 0,
                root: None,
            },
            ..ServiceConfig::default()
        };
        assert!(MsuiteServer::new(config).is_err());
    }
}
