//! Campaign publication workflow.
//!
//! Publishing runs the auto controls, seeds the approval roles, and moves the
//! campaign to LIVE once every approval is in. It never waits: when approvals
//! are outstanding it reports IN_REVIEW and expects to be invoked again.
//! Every path to LIVE goes through [`PublicationWorkflow::go_live`], which
//! re-checks approvals before flipping status.

use crate::approvals::ApprovalCoordinator;
use crate::controls::ControlEvaluator;
use crate::store::ManagementStore;
use campaign_core::types::{Approval, ApprovalDecision, AuditAction, Campaign, CampaignStatus};
use campaign_core::{CampaignError, CampaignResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Result of a publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishOutcome {
    Live,
    InReview { approvals: Vec<Approval> },
}

pub struct PublicationWorkflow {
    store: Arc<ManagementStore>,
    controls: Arc<ControlEvaluator>,
    approvals: Arc<ApprovalCoordinator>,
}

impl PublicationWorkflow {
    pub fn new(
        store: Arc<ManagementStore>,
        controls: Arc<ControlEvaluator>,
        approvals: Arc<ApprovalCoordinator>,
    ) -> Self {
        Self {
            store,
            controls,
            approvals,
        }
    }

    /// DRAFT -> IN_REVIEW.
    pub fn submit_for_review(&self, campaign_id: Uuid, actor: &str) -> CampaignResult<Campaign> {
        let (previous, campaign) = self.store.transition_campaign_status(
            campaign_id,
            &[CampaignStatus::Draft],
            CampaignStatus::InReview,
        )?;
        self.store.append_audit(
            Some(campaign_id),
            actor,
            AuditAction::CampaignSubmitted,
            serde_json::json!({"from": previous, "to": campaign.status}),
        );
        info!(campaign_id = %campaign_id, "Campaign submitted for review");
        Ok(campaign)
    }

    pub fn publish(&self, campaign_id: Uuid, actor: &str) -> CampaignResult<PublishOutcome> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .ok_or_else(|| CampaignError::not_found("Campaign", campaign_id))?;
        if campaign.status != CampaignStatus::InReview {
            return Err(CampaignError::PreconditionFailed(format!(
                "campaign must be IN_REVIEW to publish (current status: {})",
                campaign.status
            )));
        }

        let controls = self.controls.run_auto_controls(campaign_id, actor)?;
        if !controls.pass {
            return Err(CampaignError::ControlsFailed(controls.summary));
        }

        let summary = self.approvals.trigger_approvals(campaign_id)?;
        if !summary.all_approved {
            let pending = summary
                .approvals
                .iter()
                .filter(|a| a.decision != ApprovalDecision::Approved)
                .count();
            info!(campaign_id = %campaign_id, pending, "Publish waiting on approvals");
            return Ok(PublishOutcome::InReview {
                approvals: summary.approvals,
            });
        }

        match self.go_live(campaign_id, actor) {
            Ok(_) => {
                metrics::counter!("management.campaigns.published").increment(1);
                Ok(PublishOutcome::Live)
            }
            // A concurrent publish won the transition; the campaign is live either way.
            Err(CampaignError::PreconditionFailed(reason)) if self.is_live(campaign_id) => {
                info!(campaign_id = %campaign_id, reason = %reason, "Campaign went live in a concurrent publish");
                Ok(PublishOutcome::Live)
            }
            Err(e) => Err(e),
        }
    }

    fn is_live(&self, campaign_id: Uuid) -> bool {
        self.store
            .get_campaign(campaign_id)
            .is_some_and(|c| c.status == CampaignStatus::Live)
    }

    /// The single guarded transition to LIVE: approvals must be complete and
    /// the campaign must be IN_REVIEW or TESTING.
    pub fn go_live(&self, campaign_id: Uuid, actor: &str) -> CampaignResult<Campaign> {
        if self.store.get_campaign(campaign_id).is_none() {
            return Err(CampaignError::not_found("Campaign", campaign_id));
        }
        if !self.approvals.all_approvals_complete(campaign_id) {
            return Err(CampaignError::PreconditionFailed(
                "all approvals must be APPROVED before go-live".into(),
            ));
        }

        let (previous, campaign) = self.store.transition_campaign_status(
            campaign_id,
            &[CampaignStatus::InReview, CampaignStatus::Testing],
            CampaignStatus::Live,
        )?;
        self.store.append_audit(
            Some(campaign_id),
            actor,
            AuditAction::CampaignGoLive,
            serde_json::json!({"from": previous, "to": campaign.status}),
        );
        info!(campaign_id = %campaign_id, from = %previous, "Campaign is live");
        Ok(campaign)
    }
}
