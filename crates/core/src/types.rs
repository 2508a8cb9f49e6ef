//! Console domain types: campaigns, segments, control checklists,
//! approvals, simulation runs, and the audit log.

use crate::error::{CampaignError, CampaignResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ─── Campaign ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub purpose: String,
    pub status: CampaignStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_ids: Vec<String>,
    #[serde(default)]
    pub metrics: CampaignMetrics,
    /// Latest control checklist; replaced on every control run.
    pub checklist_id: Option<Uuid>,
    pub fulfillment_plan_id: Option<Uuid>,
    pub channel_plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    InReview,
    Testing,
    Live,
    Ended,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "DRAFT",
            CampaignStatus::InReview => "IN_REVIEW",
            CampaignStatus::Testing => "TESTING",
            CampaignStatus::Live => "LIVE",
            CampaignStatus::Ended => "ENDED",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time performance snapshot carried on a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CampaignMetrics {
    pub activations: u64,
    pub revenue: f64,
    pub projected_lift_pct: f64,
    pub error_rate_pct: f64,
    pub cost: f64,
}

// ─── Segment ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Estimated member count; `None` falls back to the configured default.
    pub estimated_size: Option<u64>,
    pub created_at: DateTime<Utc>,
}

// ─── Control Checklist ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlResult {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub name: String,
    pub result: ControlResult,
    pub evidence_ref: Option<String>,
}

impl ChecklistItem {
    pub fn new(name: impl Into<String>, result: ControlResult) -> Self {
        Self {
            name: name.into(),
            result,
            evidence_ref: None,
        }
    }

    pub fn with_evidence(mut self, evidence_ref: impl Into<String>) -> Self {
        self.evidence_ref = Some(evidence_ref.into());
        self
    }
}

/// Immutable record of one control run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlChecklist {
    pub id: Uuid,
    pub campaign_id: Uuid,
    /// Name of the policy that produced the items.
    pub policy: String,
    pub items: Vec<ChecklistItem>,
    pub created_at: DateTime<Utc>,
}

// ─── Approval ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    #[default]
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub role: String,
    pub actor: Option<String>,
    pub decision: ApprovalDecision,
    /// Set only once the decision leaves PENDING.
    pub timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Approval {
    /// Apply a decision. Only PENDING → {APPROVED, REJECTED} is allowed.
    pub fn decide(&mut self, actor: &str, decision: ApprovalDecision) -> CampaignResult<()> {
        if self.decision != ApprovalDecision::Pending {
            return Err(CampaignError::InvalidTransition(format!(
                "approval {} already decided as {:?}",
                self.id, self.decision
            )));
        }
        if decision == ApprovalDecision::Pending {
            return Err(CampaignError::InvalidTransition(format!(
                "approval {} cannot be decided as PENDING",
                self.id
            )));
        }
        self.decision = decision;
        self.actor = Some(actor.to_string());
        self.timestamp = Some(Utc::now());
        Ok(())
    }
}

// ─── Simulation Run ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Fail,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Fail)
    }

    /// Step statuses only move forward: PENDING → RUNNING → {DONE | FAIL}.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Done)
                | (StepStatus::Running, StepStatus::Fail)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationStep {
    pub key: String,
    pub label: String,
    pub status: StepStatus,
}

impl SimulationStep {
    pub fn pending(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            status: StepStatus::Pending,
        }
    }

    pub fn advance(&mut self, next: StepStatus) -> CampaignResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CampaignError::InvalidTransition(format!(
                "step {} cannot move from {:?} to {:?}",
                self.key, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationInputs {
    pub cohort_size: u64,
    pub test_percentage: f64,
    pub duration_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationProjections {
    pub revenue: u64,
    pub activations: u64,
    pub error_rate_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationError {
    pub message: String,
    pub step: Option<String>,
}

/// Ownership claim a progression task holds while advancing a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressLease {
    pub owner: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl ProgressLease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub inputs: SimulationInputs,
    pub cohort_size: u64,
    pub projections: SimulationProjections,
    pub steps: Vec<SimulationStep>,
    pub finished: bool,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<SimulationError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Durable progression cursor: index of the first step without a terminal status.
    #[serde(default)]
    pub next_step_index: usize,
    #[serde(default)]
    pub lease: Option<ProgressLease>,
}

impl SimulationRun {
    pub fn current_step(&self) -> Option<&SimulationStep> {
        self.steps.get(self.next_step_index)
    }

    /// Move the current step from PENDING to RUNNING.
    pub fn start_current_step(&mut self) -> CampaignResult<()> {
        let index = self.next_step_index;
        let step = self.steps.get_mut(index).ok_or_else(|| {
            CampaignError::InvalidTransition(format!("run {} has no step {}", self.id, index))
        })?;
        step.advance(StepStatus::Running)
    }

    /// Mark the current step FAIL and close the run unsuccessfully.
    pub fn fail_current_step(&mut self, message: String) -> CampaignResult<()> {
        let index = self.next_step_index;
        let step = self.steps.get_mut(index).ok_or_else(|| {
            CampaignError::InvalidTransition(format!("run {} has no step {}", self.id, index))
        })?;
        if step.status == StepStatus::Pending {
            step.advance(StepStatus::Running)?;
        }
        step.advance(StepStatus::Fail)?;
        self.errors.push(SimulationError {
            message,
            step: Some(step.key.clone()),
        });
        self.finish(false);
        Ok(())
    }

    /// Mark the current step DONE and move the cursor; finishes the run after the last step.
    pub fn complete_current_step(&mut self) -> CampaignResult<()> {
        let index = self.next_step_index;
        let step = self.steps.get_mut(index).ok_or_else(|| {
            CampaignError::InvalidTransition(format!("run {} has no step {}", self.id, index))
        })?;
        step.advance(StepStatus::Done)?;
        self.next_step_index += 1;
        if self.next_step_index >= self.steps.len() {
            self.finish(true);
        }
        Ok(())
    }

    fn finish(&mut self, success: bool) {
        self.finished = true;
        self.success = success;
        self.finished_at = Some(Utc::now());
        self.lease = None;
    }

    /// Whole seconds between start and finish; `None` while unfinished.
    pub fn duration_secs(&self) -> Option<i64> {
        self.finished_at
            .map(|finished_at| (finished_at - self.started_at).num_seconds())
    }
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CampaignCreated,
    CampaignSubmitted,
    AutoControlsRun,
    ApprovalDecided,
    CampaignGoLive,
    SimulationStarted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub actor: String,
    pub action: AuditAction,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
