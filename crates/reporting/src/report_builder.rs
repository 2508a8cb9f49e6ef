//! Simulation report builder. Assembles a finished (or in-flight) simulation
//! run and its campaign metadata into an exportable JSON document.

use campaign_core::types::{
    Campaign, SimulationError, SimulationInputs, SimulationProjections, SimulationRun,
    SimulationStep,
};
use campaign_core::{CampaignError, CampaignResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Name used when a run's campaign no longer resolves.
pub const PLACEHOLDER_CAMPAIGN_NAME: &str = "Unknown Campaign";

// ─── Source ─────────────────────────────────────────────────────────────────

/// Read access the builder needs. Implemented by the management store.
pub trait ReportSource: Send + Sync {
    fn simulation_run(&self, run_id: Uuid) -> CampaignResult<Option<SimulationRun>>;
    fn campaign(&self, campaign_id: Uuid) -> CampaignResult<Option<Campaign>>;
}

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub campaign_id: Uuid,
    pub campaign_name: String,
    pub generated_at: DateTime<Utc>,
    pub inputs: SimulationInputs,
    pub cohort_size: u64,
    pub projections: SimulationProjections,
    pub steps: Vec<SimulationStep>,
    pub success: bool,
    pub errors: Vec<SimulationError>,
    /// Whole seconds from start to finish; `null` while the run is in flight.
    pub duration: Option<i64>,
}

// ─── Builder ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ReportBuilder {
    source: Arc<dyn ReportSource>,
}

impl ReportBuilder {
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        Self { source }
    }

    pub fn build_report(&self, run_id: Uuid) -> CampaignResult<SimulationReport> {
        let run = self
            .source
            .simulation_run(run_id)?
            .ok_or_else(|| CampaignError::not_found("Simulation run", run_id))?;

        let campaign_name = match self.source.campaign(run.campaign_id)? {
            Some(campaign) => campaign.name,
            None => {
                debug!(run_id = %run_id, campaign_id = %run.campaign_id, "Campaign missing for report, using placeholder");
                PLACEHOLDER_CAMPAIGN_NAME.to_string()
            }
        };

        let duration = run.duration_secs();
        Ok(SimulationReport {
            run_id: run.id,
            campaign_id: run.campaign_id,
            campaign_name,
            generated_at: Utc::now(),
            inputs: run.inputs,
            cohort_size: run.cohort_size,
            projections: run.projections,
            steps: run.steps,
            success: run.success,
            errors: run.errors,
            duration,
        })
    }

    /// Serialized report, one document per run.
    pub fn export_json(&self, run_id: Uuid) -> CampaignResult<String> {
        let report = self.build_report(run_id)?;
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

/// Download file name for a run's report.
pub fn report_file_name(run_id: Uuid) -> String {
    format!("simulation-report-{}.json", run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::types::{CampaignMetrics, CampaignStatus, StepStatus};
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySource {
        runs: Mutex<HashMap<Uuid, SimulationRun>>,
        campaigns: Mutex<HashMap<Uuid, Campaign>>,
    }

    impl ReportSource for MemorySource {
        fn simulation_run(&self, run_id: Uuid) -> CampaignResult<Option<SimulationRun>> {
            Ok(self.runs.lock().unwrap().get(&run_id).cloned())
        }

        fn campaign(&self, campaign_id: Uuid) -> CampaignResult<Option<Campaign>> {
            Ok(self.campaigns.lock().unwrap().get(&campaign_id).cloned())
        }
    }

    fn make_campaign(name: &str) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            name: name.into(),
            purpose: "Grow dining spend".into(),
            status: CampaignStatus::Testing,
            start_date: None,
            end_date: None,
            owner_ids: vec![],
            metrics: CampaignMetrics::default(),
            checklist_id: None,
            fulfillment_plan_id: None,
            channel_plan_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_run(campaign_id: Uuid, finished_after: Option<i64>) -> SimulationRun {
        let started_at = Utc::now() - Duration::minutes(10);
        let done = finished_after.is_some();
        SimulationRun {
            id: Uuid::new_v4(),
            campaign_id,
            inputs: SimulationInputs {
                cohort_size: 15_000,
                test_percentage: 10.0,
                duration_days: 30,
            },
            cohort_size: 15_000,
            projections: SimulationProjections {
                revenue: 446_250,
                activations: 5_250,
                error_rate_pct: 0.0,
            },
            steps: vec![SimulationStep {
                key: "rules-compile".into(),
                label: "Rules Compile".into(),
                status: if done { StepStatus::Done } else { StepStatus::Running },
            }],
            finished: done,
            success: done,
            errors: vec![],
            started_at,
            finished_at: finished_after.map(|secs| started_at + Duration::seconds(secs)),
            next_step_index: if done { 1 } else { 0 },
            lease: None,
        }
    }

    fn builder_with(runs: Vec<SimulationRun>, campaigns: Vec<Campaign>) -> ReportBuilder {
        let source = MemorySource::default();
        for run in runs {
            source.runs.lock().unwrap().insert(run.id, run);
        }
        for campaign in campaigns {
            source.campaigns.lock().unwrap().insert(campaign.id, campaign);
        }
        ReportBuilder::new(Arc::new(source))
    }

    #[test]
    fn test_finished_run_reports_duration() {
        let campaign = make_campaign("Dining 3x Points");
        let run = make_run(campaign.id, Some(125));
        let run_id = run.id;
        let builder = builder_with(vec![run], vec![campaign]);

        let report = builder.build_report(run_id).unwrap();
        assert_eq!(report.duration, Some(125));
        assert_eq!(report.campaign_name, "Dining 3x Points");
        assert!(report.success);
        assert_eq!(report.cohort_size, 15_000);
    }

    #[test]
    fn test_unfinished_run_has_null_duration() {
        let campaign = make_campaign("Travel Cashback");
        let run = make_run(campaign.id, None);
        let run_id = run.id;
        let builder = builder_with(vec![run], vec![campaign]);

        let json = builder.export_json(run_id).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["duration"].is_null());
        assert_eq!(parsed["run_id"], run_id.to_string());
        assert_eq!(parsed["steps"][0]["status"], "RUNNING");
    }

    #[test]
    fn test_missing_campaign_uses_placeholder() {
        let run = make_run(Uuid::new_v4(), Some(3));
        let run_id = run.id;
        let builder = builder_with(vec![run], vec![]);

        let report = builder.build_report(run_id).unwrap();
        assert_eq!(report.campaign_name, PLACEHOLDER_CAMPAIGN_NAME);
    }

    #[test]
    fn test_unknown_run_is_not_found() {
        let builder = builder_with(vec![], vec![]);
        let err = builder.build_report(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CampaignError::NotFound { .. }));
    }

    #[test]
    fn test_report_file_name() {
        let id = Uuid::nil();
        assert_eq!(
            report_file_name(id),
            "simulation-report-00000000-0000-0000-0000-000000000000.json"
        );
    }
}
