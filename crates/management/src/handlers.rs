//! Axum REST handlers for the management API.

use crate::approvals::{ApprovalCoordinator, ApprovalSummary};
use crate::controls::{policy_from_config, ControlEvaluator, ControlOutcome};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::*;
use crate::simulation::SimulationEngine;
use crate::store::ManagementStore;
use crate::workflows::{PublicationWorkflow, PublishOutcome};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use campaign_core::random::RandomSource;
use campaign_core::types::{Approval, AuditLogEntry, Campaign, Segment, SimulationRun};
use campaign_core::{AppConfig, CampaignError, CampaignResult};
use campaign_reporting::{report_file_name, ReportBuilder, ReportSource};
use std::sync::Arc;
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

/// Header naming the acting user; audit entries fall back to [`DEFAULT_ACTOR`].
pub const ACTOR_HEADER: &str = "x-actor";
pub const DEFAULT_ACTOR: &str = "admin";

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub store: Arc<ManagementStore>,
    pub controls: Arc<ControlEvaluator>,
    pub approvals: Arc<ApprovalCoordinator>,
    pub workflow: Arc<PublicationWorkflow>,
    pub simulations: SimulationEngine,
    pub reports: ReportBuilder,
}

impl ManagementState {
    pub fn new(
        config: &AppConfig,
        store: Arc<ManagementStore>,
        random: Arc<dyn RandomSource>,
    ) -> CampaignResult<Self> {
        config.simulation.validate()?;
        let policy = policy_from_config(&config.controls)?;
        let controls = Arc::new(ControlEvaluator::new(store.clone(), policy));
        let approvals = Arc::new(ApprovalCoordinator::new(store.clone()));
        let workflow = Arc::new(PublicationWorkflow::new(
            store.clone(),
            controls.clone(),
            approvals.clone(),
        ));
        let simulations = SimulationEngine::new(store.clone(), random, config.simulation.clone());
        let source: Arc<dyn ReportSource> = store.clone();
        Ok(Self {
            store,
            controls,
            approvals,
            workflow,
            simulations,
            reports: ReportBuilder::new(source),
        })
    }
}

fn actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string()
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn list_campaigns(State(state): State<ManagementState>) -> Json<Vec<Campaign>> {
    Json(state.store.list_campaigns())
}

pub async fn get_campaign(
    State(state): State<ManagementState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Campaign>> {
    state
        .store
        .get_campaign(id)
        .map(Json)
        .ok_or_else(|| CampaignError::not_found("Campaign", id).into())
}

pub async fn create_campaign(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state.store.create_campaign(req, &actor(&headers))?;
    metrics::counter!("management.campaigns.created").increment(1);
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn link_segment(
    State(state): State<ManagementState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<LinkSegmentRequest>,
) -> ApiResult<Json<Vec<Segment>>> {
    state.store.link_segment(id, req.segment_id)?;
    Ok(Json(state.store.segments_for_campaign(id)))
}

pub async fn submit_campaign(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.workflow.submit_for_review(id, &actor(&headers))?))
}

pub async fn run_controls(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ControlOutcome>> {
    Ok(Json(state.controls.run_auto_controls(id, &actor(&headers))?))
}

pub async fn publish_campaign(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PublishOutcome>> {
    Ok(Json(state.workflow.publish(id, &actor(&headers))?))
}

pub async fn go_live(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.workflow.go_live(id, &actor(&headers))?))
}

// ─── Approvals ─────────────────────────────────────────────────────────────

pub async fn list_approvals(
    State(state): State<ManagementState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Approval>>> {
    if state.store.get_campaign(id).is_none() {
        return Err(CampaignError::not_found("Campaign", id).into());
    }
    Ok(Json(state.approvals.approvals_for_campaign(id)))
}

pub async fn trigger_approvals(
    State(state): State<ManagementState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApprovalSummary>> {
    Ok(Json(state.approvals.trigger_approvals(id)?))
}

pub async fn record_decision(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<DecisionRequest>,
) -> ApiResult<Json<Approval>> {
    Ok(Json(state.approvals.record_decision(
        id,
        &actor(&headers),
        req.decision,
    )?))
}

// ─── Segments ──────────────────────────────────────────────────────────────

pub async fn list_segments(State(state): State<ManagementState>) -> Json<Vec<Segment>> {
    Json(state.store.list_segments())
}

pub async fn create_segment(
    State(state): State<ManagementState>,
    ApiJson(req): ApiJson<CreateSegmentRequest>,
) -> ApiResult<(StatusCode, Json<Segment>)> {
    let segment = state.store.create_segment(req)?;
    Ok((StatusCode::CREATED, Json(segment)))
}

// ─── Simulations ───────────────────────────────────────────────────────────

pub async fn start_simulation(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<StartSimulationRequest>,
) -> ApiResult<Json<StartSimulationResponse>> {
    let campaign_id = req
        .campaign_id
        .ok_or_else(|| ApiError::validation("campaign_id is required"))?;
    let run = state
        .simulations
        .start_simulation(campaign_id, &actor(&headers))?;
    Ok(Json(StartSimulationResponse { run_id: run.id }))
}

pub async fn get_simulation(
    State(state): State<ManagementState>,
    ApiPath(run_id): ApiPath<Uuid>,
) -> ApiResult<Json<SimulationRun>> {
    state
        .simulations
        .run_status(run_id)
        .map(Json)
        .ok_or_else(|| CampaignError::not_found("Simulation run", run_id).into())
}

pub async fn simulation_status(
    State(state): State<ManagementState>,
    ApiQuery(query): ApiQuery<RunQuery>,
) -> ApiResult<Json<RunStatusResponse>> {
    let run_id = query
        .run_id
        .ok_or_else(|| ApiError::validation("run_id is required"))?;
    let run = state
        .simulations
        .run_status(run_id)
        .ok_or_else(|| CampaignError::not_found("Simulation run", run_id))?;
    Ok(Json(RunStatusResponse { run }))
}

pub async fn campaign_simulations(
    State(state): State<ManagementState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<SimulationRun>>> {
    if state.store.get_campaign(id).is_none() {
        return Err(CampaignError::not_found("Campaign", id).into());
    }
    Ok(Json(state.simulations.runs_for_campaign(id)))
}

// ─── Reports ───────────────────────────────────────────────────────────────

pub async fn export_simulation_report(
    State(state): State<ManagementState>,
    ApiQuery(query): ApiQuery<RunQuery>,
) -> ApiResult<Response> {
    let run_id = query
        .run_id
        .ok_or_else(|| ApiError::validation("run_id is required"))?;
    let document = state.reports.export_json(run_id)?;
    let disposition = format!("attachment; filename=\"{}\"", report_file_name(run_id));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| CampaignError::Internal(anyhow::anyhow!("invalid header: {}", e)))?;
    metrics::counter!("management.reports.exported").increment(1);

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    )
        .into_response())
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

pub async fn audit_log(
    State(state): State<ManagementState>,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> Json<Vec<AuditLogEntry>> {
    match query.campaign_id {
        Some(id) => Json(state.store.audit_for_campaign(id)),
        None => Json(state.store.get_audit_log()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::random::FixedRandom;

    #[test]
    fn test_actor_header_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor(&headers), "admin");
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  "));
        assert_eq!(actor(&headers), "admin");
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("risk-officer"));
        assert_eq!(actor(&headers), "risk-officer");
    }

    #[test]
    fn test_state_rejects_lease_shorter_than_a_step() {
        let mut config = AppConfig::default();
        config.simulation.lease_ttl_secs = 1;
        config.simulation.step_delay_ms = 1_000;
        config.simulation.in_flight_delay_ms = 500;
        let store = Arc::new(ManagementStore::new());
        let result = ManagementState::new(&config, store, Arc::new(FixedRandom(0.5)));
        assert!(matches!(result, Err(CampaignError::Config(_))));
    }
}
