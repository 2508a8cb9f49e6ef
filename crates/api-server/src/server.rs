//! API server: management REST endpoints plus health checks, and the
//! Prometheus exporter on its own port.

use crate::rest::{self, AppState};
use axum::routing::get;
use axum::Router;
use campaign_core::config::AppConfig;
use campaign_management::{management_router, ManagementState};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Assemble the full HTTP application.
pub fn build_app(state: AppState, management: ManagementState) -> Router {
    let ops = Router::new()
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .with_state(state);

    Router::new()
        .merge(management_router(management))
        .merge(ops)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    config: AppConfig,
    management: ManagementState,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, management: ManagementState) -> Self {
        let state = AppState::new(config.instance_id.clone());
        Self {
            config,
            management,
            state,
        }
    }

    /// Report ready on `/ready` from now on.
    pub fn mark_ready(&self) {
        self.state.mark_ready();
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone(), self.management.clone())
    }

    /// Serve HTTP until `shutdown` resolves.
    pub async fn start_http<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.app())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
