//! Management API router, mounted under /api/v1/management.

use crate::handlers::{self, ManagementState};
use axum::routing::{get, post};
use axum::Router;

/// Build the management router with all endpoints.
/// Returns a Router that should be merged into the main app.
pub fn management_router(state: ManagementState) -> Router {
    Router::new()
        // Campaigns
        .route("/api/v1/management/campaigns", get(handlers::list_campaigns).post(handlers::create_campaign))
        .route("/api/v1/management/campaigns/:id", get(handlers::get_campaign))
        .route("/api/v1/management/campaigns/:id/segments", post(handlers::link_segment))
        .route("/api/v1/management/campaigns/:id/submit", post(handlers::submit_campaign))
        .route("/api/v1/management/campaigns/:id/controls", post(handlers::run_controls))
        .route("/api/v1/management/campaigns/:id/publish", post(handlers::publish_campaign))
        .route("/api/v1/management/campaigns/:id/go-live", post(handlers::go_live))
        .route("/api/v1/management/campaigns/:id/simulations", get(handlers::campaign_simulations))
        // Approvals
        .route("/api/v1/management/campaigns/:id/approvals", get(handlers::list_approvals))
        .route("/api/v1/management/campaigns/:id/approvals/trigger", post(handlers::trigger_approvals))
        .route("/api/v1/management/approvals/:id/decision", post(handlers::record_decision))
        // Segments
        .route("/api/v1/management/segments", get(handlers::list_segments).post(handlers::create_segment))
        // Simulations
        .route("/api/v1/management/simulations", post(handlers::start_simulation))
        .route("/api/v1/management/simulations/status", get(handlers::simulation_status))
        .route("/api/v1/management/simulations/:run_id", get(handlers::get_simulation))
        // Reports
        .route("/api/v1/management/reports/simulation", get(handlers::export_simulation_report))
        // Audit log
        .route("/api/v1/management/audit-log", get(handlers::audit_log))
        .with_state(state)
}
