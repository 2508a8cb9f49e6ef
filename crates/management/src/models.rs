//! Management API request/response types. Domain records live in
//! `campaign_core::types`.

use campaign_core::types::{ApprovalDecision, CampaignMetrics, SimulationRun};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Optional UUID field where an empty or blank string means absent.
fn optional_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => Uuid::parse_str(raw.trim())
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid UUID {:?}: {}", raw, e))),
        _ => Ok(None),
    }
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_ids: Vec<String>,
    #[serde(default)]
    pub metrics: CampaignMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSegmentRequest {
    pub segment_id: Uuid,
}

// ─── Segments ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSegmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_size: Option<u64>,
}

// ─── Approvals ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: ApprovalDecision,
}

// ─── Simulations ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSimulationRequest {
    #[serde(default, deserialize_with = "optional_uuid")]
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSimulationResponse {
    pub run_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunQuery {
    #[serde(default, deserialize_with = "optional_uuid")]
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatusResponse {
    pub run: SimulationRun,
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default, deserialize_with = "optional_uuid")]
    pub campaign_id: Option<Uuid>,
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
