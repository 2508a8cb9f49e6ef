//! In-memory management store backed by DashMap.
//!
//! Each map plays the role of one relational table. Durability comes from
//! JSON snapshots (`save_snapshot` / `from_snapshot_file`).

use crate::models::*;
use campaign_core::types::*;
use campaign_core::{CampaignError, CampaignResult};
use campaign_reporting::ReportSource;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Thread-safe in-memory store for campaigns, segments, checklists,
/// approvals, simulation runs, and the audit log.
pub struct ManagementStore {
    campaigns: DashMap<Uuid, Campaign>,
    segments: DashMap<Uuid, Segment>,
    /// campaign_id -> linked segment ids
    campaign_segments: DashMap<Uuid, Vec<Uuid>>,
    checklists: DashMap<Uuid, ControlChecklist>,
    /// campaign_id -> approvals, one per role
    approvals: DashMap<Uuid, Vec<Approval>>,
    simulation_runs: DashMap<Uuid, SimulationRun>,
    audit_log: DashMap<Uuid, AuditLogEntry>,
}

/// Row of the campaign↔segment junction table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignSegmentLink {
    pub campaign_id: Uuid,
    pub segment_id: Uuid,
}

/// Serializable copy of every table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub campaign_segments: Vec<CampaignSegmentLink>,
    #[serde(default)]
    pub checklists: Vec<ControlChecklist>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    #[serde(default)]
    pub simulation_runs: Vec<SimulationRun>,
    #[serde(default)]
    pub audit_log: Vec<AuditLogEntry>,
}

impl Default for ManagementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementStore {
    pub fn new() -> Self {
        Self {
            campaigns: DashMap::new(),
            segments: DashMap::new(),
            campaign_segments: DashMap::new(),
            checklists: DashMap::new(),
            approvals: DashMap::new(),
            simulation_runs: DashMap::new(),
            audit_log: DashMap::new(),
        }
    }

    /// Store pre-populated with a small demo portfolio.
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        store.seed_demo_data();
        info!(
            campaigns = store.campaigns.len(),
            segments = store.segments.len(),
            "Management store seeded with demo data"
        );
        store
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn list_campaigns(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    pub fn get_campaign(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|r| r.value().clone())
    }

    pub fn create_campaign(&self, req: CreateCampaignRequest, actor: &str) -> CampaignResult<Campaign> {
        if req.name.trim().is_empty() {
            return Err(CampaignError::Validation("campaign name must not be empty".into()));
        }
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: req.name,
            purpose: req.purpose,
            status: CampaignStatus::Draft,
            start_date: req.start_date,
            end_date: req.end_date,
            owner_ids: req.owner_ids,
            metrics: req.metrics,
            checklist_id: None,
            fulfillment_plan_id: None,
            channel_plan_id: None,
            created_at: now,
            updated_at: now,
        };
        self.campaigns.insert(campaign.id, campaign.clone());
        self.append_audit(
            Some(campaign.id),
            actor,
            AuditAction::CampaignCreated,
            serde_json::json!({"name": &campaign.name}),
        );
        Ok(campaign)
    }

    /// Compare-and-set on campaign status. Returns the previous status and
    /// the updated campaign; fails without mutation when the current status
    /// is not one of `allowed_from`.
    pub fn transition_campaign_status(
        &self,
        id: Uuid,
        allowed_from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> CampaignResult<(CampaignStatus, Campaign)> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::not_found("Campaign", id))?;
        let campaign = entry.value_mut();
        let previous = campaign.status;
        if !allowed_from.contains(&previous) {
            return Err(CampaignError::PreconditionFailed(format!(
                "campaign {} is {}, cannot move to {}",
                id, previous, to
            )));
        }
        campaign.status = to;
        campaign.updated_at = Utc::now();
        Ok((previous, campaign.clone()))
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    pub fn list_segments(&self) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self.segments.iter().map(|r| r.value().clone()).collect();
        segments.sort_by(|a, b| a.name.cmp(&b.name));
        segments
    }

    pub fn get_segment(&self, id: Uuid) -> Option<Segment> {
        self.segments.get(&id).map(|r| r.value().clone())
    }

    pub fn create_segment(&self, req: CreateSegmentRequest) -> CampaignResult<Segment> {
        if req.name.trim().is_empty() {
            return Err(CampaignError::Validation("segment name must not be empty".into()));
        }
        let segment = Segment {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            estimated_size: req.estimated_size,
            created_at: Utc::now(),
        };
        self.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    /// Link a segment to a campaign. Linking twice is a no-op.
    pub fn link_segment(&self, campaign_id: Uuid, segment_id: Uuid) -> CampaignResult<()> {
        if !self.campaigns.contains_key(&campaign_id) {
            return Err(CampaignError::not_found("Campaign", campaign_id));
        }
        if !self.segments.contains_key(&segment_id) {
            return Err(CampaignError::not_found("Segment", segment_id));
        }
        let mut links = self.campaign_segments.entry(campaign_id).or_default();
        if !links.contains(&segment_id) {
            links.push(segment_id);
        }
        Ok(())
    }

    pub fn segments_for_campaign(&self, campaign_id: Uuid) -> Vec<Segment> {
        let ids = self
            .campaign_segments
            .get(&campaign_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.get_segment(id)).collect()
    }

    // ─── Control Checklists ────────────────────────────────────────────────

    /// Persist a checklist and point the campaign at it, replacing any
    /// earlier linkage. Older checklists stay stored but unreferenced.
    pub fn attach_checklist(&self, checklist: ControlChecklist) -> CampaignResult<()> {
        let campaign_id = checklist.campaign_id;
        let mut entry = self
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| CampaignError::not_found("Campaign", campaign_id))?;
        let campaign = entry.value_mut();
        campaign.checklist_id = Some(checklist.id);
        campaign.updated_at = Utc::now();
        self.checklists.insert(checklist.id, checklist);
        Ok(())
    }

    pub fn get_checklist(&self, id: Uuid) -> Option<ControlChecklist> {
        self.checklists.get(&id).map(|r| r.value().clone())
    }

    pub fn checklists_for_campaign(&self, campaign_id: Uuid) -> Vec<ControlChecklist> {
        let mut checklists: Vec<ControlChecklist> = self
            .checklists
            .iter()
            .filter(|r| r.value().campaign_id == campaign_id)
            .map(|r| r.value().clone())
            .collect();
        checklists.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        checklists
    }

    // ─── Approvals ─────────────────────────────────────────────────────────

    pub fn insert_approval(&self, approval: Approval) {
        self.approvals
            .entry(approval.campaign_id)
            .or_default()
            .push(approval);
    }

    pub fn approvals_for_campaign(&self, campaign_id: Uuid) -> Vec<Approval> {
        self.approvals
            .get(&campaign_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Create a PENDING approval for each role that has none yet. Runs under
    /// the campaign's entry lock so concurrent seeding cannot duplicate roles.
    pub fn seed_approval_roles(&self, campaign_id: Uuid, roles: &[&str]) -> Vec<Approval> {
        let mut entry = self.approvals.entry(campaign_id).or_default();
        for role in roles {
            if entry.iter().any(|a| a.role == *role) {
                continue;
            }
            entry.push(Approval {
                id: Uuid::new_v4(),
                campaign_id,
                role: role.to_string(),
                actor: None,
                decision: ApprovalDecision::Pending,
                timestamp: None,
                created_at: Utc::now(),
            });
        }
        entry.value().clone()
    }

    pub fn decide_approval(
        &self,
        approval_id: Uuid,
        actor: &str,
        decision: ApprovalDecision,
    ) -> CampaignResult<Approval> {
        for mut entry in self.approvals.iter_mut() {
            if let Some(approval) = entry.value_mut().iter_mut().find(|a| a.id == approval_id) {
                approval.decide(actor, decision)?;
                return Ok(approval.clone());
            }
        }
        Err(CampaignError::not_found("Approval", approval_id))
    }

    // ─── Simulation Runs ───────────────────────────────────────────────────

    pub fn insert_run(&self, run: SimulationRun) {
        self.simulation_runs.insert(run.id, run);
    }

    pub fn get_run(&self, id: Uuid) -> Option<SimulationRun> {
        self.simulation_runs.get(&id).map(|r| r.value().clone())
    }

    pub fn runs_for_campaign(&self, campaign_id: Uuid) -> Vec<SimulationRun> {
        let mut runs: Vec<SimulationRun> = self
            .simulation_runs
            .iter()
            .filter(|r| r.value().campaign_id == campaign_id)
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    pub fn unfinished_runs(&self) -> Vec<SimulationRun> {
        self.simulation_runs
            .iter()
            .filter(|r| !r.value().finished)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Atomically take the progression lease on a run. Returns `false` when
    /// the run is finished or another owner holds an unexpired lease.
    pub fn claim_run(&self, run_id: Uuid, owner: Uuid, ttl: Duration) -> CampaignResult<bool> {
        let mut entry = self
            .simulation_runs
            .get_mut(&run_id)
            .ok_or_else(|| CampaignError::not_found("Simulation run", run_id))?;
        let run = entry.value_mut();
        let now = Utc::now();
        if run.finished {
            return Ok(false);
        }
        if let Some(lease) = &run.lease {
            if lease.owner != owner && !lease.is_expired(now) {
                return Ok(false);
            }
        }
        run.lease = Some(ProgressLease {
            owner,
            expires_at: now + ttl,
        });
        Ok(true)
    }

    /// Read-modify-write on a run guarded by its lease. The mutation is applied
    /// to a copy, so a rejected transition leaves the stored row untouched.
    /// The lease is renewed on success and released once the run finishes.
    pub fn update_leased_run<F>(
        &self,
        run_id: Uuid,
        owner: Uuid,
        ttl: Duration,
        mutate: F,
    ) -> CampaignResult<SimulationRun>
    where
        F: FnOnce(&mut SimulationRun) -> CampaignResult<()>,
    {
        let mut entry = self
            .simulation_runs
            .get_mut(&run_id)
            .ok_or_else(|| CampaignError::not_found("Simulation run", run_id))?;
        let run = entry.value_mut();
        match &run.lease {
            Some(lease) if lease.owner == owner => {}
            _ => return Err(CampaignError::LeaseLost(run_id)),
        }

        let mut updated = run.clone();
        mutate(&mut updated)?;
        if !updated.finished {
            updated.lease = Some(ProgressLease {
                owner,
                expires_at: Utc::now() + ttl,
            });
        }
        *run = updated.clone();
        Ok(updated)
    }

    // ─── Audit Log ─────────────────────────────────────────────────────────

    pub fn get_audit_log(&self) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self.audit_log.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn audit_for_campaign(&self, campaign_id: Uuid) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self
            .audit_log
            .iter()
            .filter(|r| r.value().campaign_id == Some(campaign_id))
            .map(|r| r.value().clone())
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn append_audit(
        &self,
        campaign_id: Option<Uuid>,
        actor: &str,
        action: AuditAction,
        payload: serde_json::Value,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            campaign_id,
            actor: actor.to_string(),
            action,
            payload,
            timestamp: Utc::now(),
        };
        self.audit_log.insert(entry.id, entry);
    }

    // ─── Snapshots ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> StoreSnapshot {
        let campaign_segments = self
            .campaign_segments
            .iter()
            .flat_map(|r| {
                let campaign_id = *r.key();
                r.value()
                    .iter()
                    .map(move |segment_id| CampaignSegmentLink {
                        campaign_id,
                        segment_id: *segment_id,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        StoreSnapshot {
            taken_at: Utc::now(),
            campaigns: self.campaigns.iter().map(|r| r.value().clone()).collect(),
            segments: self.segments.iter().map(|r| r.value().clone()).collect(),
            campaign_segments,
            checklists: self.checklists.iter().map(|r| r.value().clone()).collect(),
            approvals: self.approvals.iter().flat_map(|r| r.value().clone()).collect(),
            simulation_runs: self.simulation_runs.iter().map(|r| r.value().clone()).collect(),
            audit_log: self.audit_log.iter().map(|r| r.value().clone()).collect(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for campaign in snapshot.campaigns {
            store.campaigns.insert(campaign.id, campaign);
        }
        for segment in snapshot.segments {
            store.segments.insert(segment.id, segment);
        }
        for link in snapshot.campaign_segments {
            store
                .campaign_segments
                .entry(link.campaign_id)
                .or_default()
                .push(link.segment_id);
        }
        for checklist in snapshot.checklists {
            store.checklists.insert(checklist.id, checklist);
        }
        for approval in snapshot.approvals {
            store.insert_approval(approval);
        }
        for run in snapshot.simulation_runs {
            store.simulation_runs.insert(run.id, run);
        }
        for entry in snapshot.audit_log {
            store.audit_log.insert(entry.id, entry);
        }
        store
    }

    /// Load a store from a snapshot file; a missing file yields an empty store.
    pub fn from_snapshot_file(path: impl AsRef<Path>) -> CampaignResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No store snapshot found, starting empty");
            return Ok(Self::new());
        }
        let bytes = std::fs::read(path)?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            taken_at = %snapshot.taken_at,
            campaigns = snapshot.campaigns.len(),
            runs = snapshot.simulation_runs.len(),
            "Store snapshot loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write a snapshot next to `path` and rename it into place.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> CampaignResult<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    // ─── Demo Data ─────────────────────────────────────────────────────────

    fn seed_demo_data(&self) {
        let now = Utc::now();
        let segments = [
            ("Frequent Travelers", Some(10_000)),
            ("Dining Enthusiasts", Some(5_000)),
            ("New Cardmembers", None),
        ];
        let segment_ids: Vec<Uuid> = segments
            .iter()
            .map(|(name, size)| {
                let segment = Segment {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    description: None,
                    estimated_size: *size,
                    created_at: now,
                };
                let id = segment.id;
                self.segments.insert(id, segment);
                id
            })
            .collect();

        let campaigns = [
            ("Dining 3x Points", "Lift restaurant spend among engaged members", CampaignStatus::InReview),
            ("Travel 5% Cashback", "Recover travel share after the summer lull", CampaignStatus::Draft),
            ("Welcome $200 Bonus", "Activate new accounts in their first 90 days", CampaignStatus::Live),
        ];
        for (i, (name, purpose, status)) in campaigns.iter().enumerate() {
            let campaign = Campaign {
                id: Uuid::new_v4(),
                name: name.to_string(),
                purpose: purpose.to_string(),
                status: *status,
                start_date: Some(now),
                end_date: Some(now + Duration::days(30)),
                owner_ids: vec!["marketing-ops".to_string()],
                metrics: CampaignMetrics {
                    activations: 1_200 * (i as u64 + 1),
                    revenue: 85_000.0 * (i as f64 + 1.0),
                    projected_lift_pct: 3.5,
                    error_rate_pct: 0.4,
                    cost: 12_500.0,
                },
                checklist_id: None,
                fulfillment_plan_id: None,
                channel_plan_id: None,
                created_at: now,
                updated_at: now,
            };
            let id = campaign.id;
            self.campaigns.insert(id, campaign);
            self.campaign_segments
                .insert(id, segment_ids.iter().take(i + 1).copied().collect());
        }
    }
}

impl ReportSource for ManagementStore {
    fn simulation_run(&self, run_id: Uuid) -> CampaignResult<Option<SimulationRun>> {
        Ok(self.get_run(run_id))
    }

    fn campaign(&self, campaign_id: Uuid) -> CampaignResult<Option<Campaign>> {
        Ok(self.get_campaign(campaign_id))
    }
}
