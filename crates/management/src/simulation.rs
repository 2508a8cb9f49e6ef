//! End-to-end simulation runs.
//!
//! A run walks a fixed, ordered pipeline of steps. Projections are computed
//! once at start so pollers see them immediately; the steps are then advanced
//! by a detached task, one at a time, with every transition written back to
//! the store. Progress is only observable by re-reading the run.
//!
//! A task must hold the run's lease to write to it, and the cursor
//! (`next_step_index`) is persisted with every write, so a restarted process
//! can pick up where the previous one stopped.

use crate::store::ManagementStore;
use campaign_core::config::{SimulationConfig, MAX_LEASE_TTL_SECS};
use campaign_core::random::RandomSource;
use campaign_core::types::{
    AuditAction, ProgressLease, Segment, SimulationInputs, SimulationProjections, SimulationRun,
    SimulationStep, StepStatus,
};
use campaign_core::{CampaignError, CampaignResult};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Pipeline steps as `(key, label)`, in execution order.
pub const SIMULATION_STEPS: [(&str, &str); 7] = [
    ("rules-compile", "Rules Compile"),
    ("data-availability", "Data Availability"),
    ("channel-mock", "Channel Mock"),
    ("presentment", "Presentment"),
    ("disposition", "Disposition"),
    ("fulfillment", "Fulfillment"),
    ("report", "Report"),
];

const ACTIVATION_RATE: f64 = 0.35;
const REVENUE_PER_ACTIVATION: f64 = 85.0;
const REVENUE_NOISE: f64 = 100_000.0;
const ACTIVATION_NOISE: f64 = 1_000.0;
const ERROR_RATE_NOISE_PCT: f64 = 1.5;

/// Sum of linked segment sizes; unsized segments count as `default_size`.
pub fn cohort_size(segments: &[Segment], default_size: u64) -> CampaignResult<u64> {
    segments.iter().try_fold(0u64, |total, segment| {
        let size = segment.estimated_size.unwrap_or(default_size);
        total.checked_add(size).ok_or_else(|| {
            CampaignError::Validation(format!(
                "cohort size overflows when adding segment {} ({} members)",
                segment.id, size
            ))
        })
    })
}

/// Noisy projection from cohort size. Draws revenue, activations, then error rate.
pub fn project(cohort_size: u64, random: &dyn RandomSource) -> SimulationProjections {
    let cohort = cohort_size as f64;
    let revenue =
        (cohort * ACTIVATION_RATE * REVENUE_PER_ACTIVATION + random.next_f64() * REVENUE_NOISE).floor();
    let activations = (cohort * ACTIVATION_RATE + random.next_f64() * ACTIVATION_NOISE).floor();
    SimulationProjections {
        revenue: revenue as u64,
        activations: activations as u64,
        error_rate_pct: random.next_f64() * ERROR_RATE_NOISE_PCT,
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RecoveryReport {
    pub resumed: Vec<Uuid>,
    pub orphaned: Vec<Uuid>,
    /// Unfinished runs whose lease is still live.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct SimulationEngine {
    store: Arc<ManagementStore>,
    random: Arc<dyn RandomSource>,
    settings: SimulationConfig,
}

impl SimulationEngine {
    pub fn new(
        store: Arc<ManagementStore>,
        random: Arc<dyn RandomSource>,
        settings: SimulationConfig,
    ) -> Self {
        Self {
            store,
            random,
            settings,
        }
    }

    /// Create a run and launch its progression. Returns without waiting.
    pub fn start_simulation(&self, campaign_id: Uuid, actor: &str) -> CampaignResult<SimulationRun> {
        let run = self.create_run(campaign_id, actor)?;
        let owner = run
            .lease
            .as_ref()
            .map(|lease| lease.owner)
            .unwrap_or_else(Uuid::new_v4);
        self.spawn_progression(run.id, owner);
        Ok(run)
    }

    /// Persist a new run with projections and all steps PENDING. The run is
    /// stored already leased, so recovery never mistakes it for an
    /// interrupted one; the lease owner drives its progression.
    pub fn create_run(&self, campaign_id: Uuid, actor: &str) -> CampaignResult<SimulationRun> {
        if self.store.get_campaign(campaign_id).is_none() {
            return Err(CampaignError::not_found("Campaign", campaign_id));
        }
        let segments = self.store.segments_for_campaign(campaign_id);
        let cohort = cohort_size(&segments, self.settings.default_segment_size)?;
        let projections = project(cohort, self.random.as_ref());

        let now = Utc::now();
        let run = SimulationRun {
            id: Uuid::new_v4(),
            campaign_id,
            inputs: SimulationInputs {
                cohort_size: cohort,
                test_percentage: self.settings.test_percentage,
                duration_days: self.settings.duration_days,
            },
            cohort_size: cohort,
            projections,
            steps: SIMULATION_STEPS
                .iter()
                .map(|(key, label)| SimulationStep::pending(key, label))
                .collect(),
            finished: false,
            success: false,
            errors: Vec::new(),
            started_at: now,
            finished_at: None,
            next_step_index: 0,
            lease: Some(ProgressLease {
                owner: Uuid::new_v4(),
                expires_at: now + self.lease_ttl(),
            }),
        };
        self.store.insert_run(run.clone());
        self.store.append_audit(
            Some(campaign_id),
            actor,
            AuditAction::SimulationStarted,
            serde_json::json!({"run_id": run.id, "cohort_size": cohort, "segments": segments.len()}),
        );

        metrics::counter!("management.simulations.started").increment(1);
        info!(run_id = %run.id, campaign_id = %campaign_id, cohort_size = cohort, "Simulation run created");
        Ok(run)
    }

    pub fn run_status(&self, run_id: Uuid) -> Option<SimulationRun> {
        self.store.get_run(run_id)
    }

    pub fn runs_for_campaign(&self, campaign_id: Uuid) -> Vec<SimulationRun> {
        self.store.runs_for_campaign(campaign_id)
    }

    /// Detach a task that drives the run to completion as `owner`.
    pub fn spawn_progression(&self, run_id: Uuid, owner: Uuid) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.run_progression(run_id, owner).await {
                Ok(Some(run)) => {
                    info!(run_id = %run_id, success = run.success, "Simulation run finished")
                }
                Ok(None) => debug!(run_id = %run_id, "Simulation run held elsewhere, not advancing"),
                Err(CampaignError::LeaseLost(_)) => {
                    warn!(run_id = %run_id, "Simulation lease lost, stopping progression")
                }
                Err(e) => error!(run_id = %run_id, error = %e, "Simulation progression failed"),
            }
        })
    }

    /// Claim (or renew, when `owner` already holds it) the run's lease and
    /// advance it step by step until it finishes.
    ///
    /// Returns `Ok(None)` when another owner holds the lease or the run was
    /// already finished. Resumes from the persisted cursor; a step found
    /// RUNNING continues straight to its terminal status.
    pub async fn run_progression(
        &self,
        run_id: Uuid,
        owner: Uuid,
    ) -> CampaignResult<Option<SimulationRun>> {
        let ttl = self.lease_ttl();
        if !self.store.claim_run(run_id, owner, ttl)? {
            return Ok(None);
        }

        loop {
            let run = self
                .store
                .get_run(run_id)
                .ok_or_else(|| CampaignError::not_found("Simulation run", run_id))?;
            if run.finished {
                return Ok(Some(run));
            }
            let index = run.next_step_index;
            let step = run.current_step().cloned().ok_or_else(|| {
                CampaignError::InvalidTransition(format!(
                    "run {} is unfinished but has no step {}",
                    run_id, index
                ))
            })?;

            if step.status == StepStatus::Pending {
                tokio::time::sleep(Duration::from_millis(self.settings.step_delay_ms)).await;
                self.store
                    .update_leased_run(run_id, owner, ttl, |run| run.start_current_step())?;
                debug!(run_id = %run_id, step = %step.key, "Simulation step running");
            }

            tokio::time::sleep(Duration::from_millis(self.settings.in_flight_delay_ms)).await;

            let inject_failure = index >= self.settings.failure_exempt_steps
                && self.random.next_f64() < self.settings.failure_probability;
            let updated = self.store.update_leased_run(run_id, owner, ttl, |run| {
                if inject_failure {
                    run.fail_current_step(format!("Simulated failure during {}", step.label))
                } else {
                    run.complete_current_step()
                }
            })?;

            if inject_failure {
                warn!(run_id = %run_id, step = %step.key, "Injected simulation failure");
            } else {
                debug!(run_id = %run_id, step = %step.key, "Simulation step done");
            }

            if updated.finished {
                let outcome = if updated.success { "success" } else { "failure" };
                metrics::counter!("management.simulations.finished", "outcome" => outcome).increment(1);
                return Ok(Some(updated));
            }
        }
    }

    /// Find unfinished runs with no live lease and resume them, or mark them
    /// orphaned when resumption is disabled. Must run inside a Tokio runtime.
    pub fn recover_interrupted_runs(&self) -> CampaignResult<RecoveryReport> {
        let now = Utc::now();
        let mut report = RecoveryReport::default();
        for run in self.store.unfinished_runs() {
            let lease_live = run.lease.as_ref().is_some_and(|l| !l.is_expired(now));
            if lease_live {
                report.skipped += 1;
                continue;
            }
            if self.settings.resume_interrupted {
                info!(run_id = %run.id, cursor = run.next_step_index, "Resuming interrupted simulation run");
                self.spawn_progression(run.id, Uuid::new_v4());
                report.resumed.push(run.id);
            } else if self.mark_orphaned(run.id)? {
                report.orphaned.push(run.id);
            }
        }
        Ok(report)
    }

    /// Close an interrupted run: its current step FAILs and the run finishes
    /// unsuccessfully. Returns `false` if the run could not be claimed.
    pub fn mark_orphaned(&self, run_id: Uuid) -> CampaignResult<bool> {
        let owner = Uuid::new_v4();
        let ttl = self.lease_ttl();
        if !self.store.claim_run(run_id, owner, ttl)? {
            return Ok(false);
        }
        self.store.update_leased_run(run_id, owner, ttl, |run| {
            run.fail_current_step("Run interrupted before completion".to_string())
        })?;
        warn!(run_id = %run_id, "Simulation run marked orphaned");
        Ok(true)
    }

    fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.settings.lease_ttl_secs.min(MAX_LEASE_TTL_SECS) as i64)
    }
}
