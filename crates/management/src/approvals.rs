//! Per-role approval records for campaign publication.

use crate::store::ManagementStore;
use campaign_core::types::{Approval, ApprovalDecision, AuditAction};
use campaign_core::{CampaignError, CampaignResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Roles that must sign off before a campaign goes live.
pub const APPROVAL_ROLES: [&str; 3] = ["Product Owner", "Risk/Compliance", "Marketing Ops"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApproval {
    pub campaign_id: Uuid,
    pub role: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub decision: ApprovalDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub all_approved: bool,
    pub approvals: Vec<Approval>,
}

pub struct ApprovalCoordinator {
    store: Arc<ManagementStore>,
}

impl ApprovalCoordinator {
    pub fn new(store: Arc<ManagementStore>) -> Self {
        Self { store }
    }

    pub fn create_approval(&self, req: NewApproval) -> CampaignResult<Approval> {
        self.require_campaign(req.campaign_id)?;
        let now = Utc::now();
        let approval = Approval {
            id: Uuid::new_v4(),
            campaign_id: req.campaign_id,
            role: req.role,
            actor: req.actor,
            decision: req.decision,
            timestamp: (req.decision != ApprovalDecision::Pending).then_some(now),
            created_at: now,
        };
        self.store.insert_approval(approval.clone());
        Ok(approval)
    }

    pub fn approvals_for_campaign(&self, campaign_id: Uuid) -> Vec<Approval> {
        self.store.approvals_for_campaign(campaign_id)
    }

    /// True iff at least one approval exists and every one is APPROVED.
    pub fn all_approvals_complete(&self, campaign_id: Uuid) -> bool {
        let approvals = self.store.approvals_for_campaign(campaign_id);
        !approvals.is_empty()
            && approvals
                .iter()
                .all(|a| a.decision == ApprovalDecision::Approved)
    }

    /// Seed a PENDING approval for every role that has none. Existing
    /// records, and their decisions, are left alone.
    pub fn trigger_approvals(&self, campaign_id: Uuid) -> CampaignResult<ApprovalSummary> {
        self.require_campaign(campaign_id)?;
        let approvals = self.store.seed_approval_roles(campaign_id, &APPROVAL_ROLES);
        let all_approved = !approvals.is_empty()
            && approvals
                .iter()
                .all(|a| a.decision == ApprovalDecision::Approved);
        Ok(ApprovalSummary {
            all_approved,
            approvals,
        })
    }

    pub fn record_decision(
        &self,
        approval_id: Uuid,
        actor: &str,
        decision: ApprovalDecision,
    ) -> CampaignResult<Approval> {
        let approval = self.store.decide_approval(approval_id, actor, decision)?;
        self.store.append_audit(
            Some(approval.campaign_id),
            actor,
            AuditAction::ApprovalDecided,
            serde_json::json!({"approval_id": approval.id, "role": &approval.role, "decision": approval.decision}),
        );
        info!(approval_id = %approval.id, role = %approval.role, decision = ?approval.decision, "Approval decision recorded");
        Ok(approval)
    }

    fn require_campaign(&self, campaign_id: Uuid) -> CampaignResult<()> {
        if self.store.get_campaign(campaign_id).is_none() {
            return Err(CampaignError::not_found("Campaign", campaign_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateCampaignRequest;
    use campaign_core::types::CampaignMetrics;

    fn setup() -> (ApprovalCoordinator, Arc<ManagementStore>, Uuid) {
        let store = Arc::new(ManagementStore::new());
        let campaign = store
            .create_campaign(
                CreateCampaignRequest {
                    name: "Travel 5% Cashback".into(),
                    purpose: "Recover travel share".into(),
                    start_date: None,
                    end_date: None,
                    owner_ids: vec![],
                    metrics: CampaignMetrics::default(),
                },
                "alice",
            )
            .unwrap();
        (ApprovalCoordinator::new(store.clone()), store, campaign.id)
    }

    fn approve_all(coordinator: &ApprovalCoordinator, campaign_id: Uuid) {
        for approval in coordinator.approvals_for_campaign(campaign_id) {
            coordinator
                .record_decision(approval.id, "approver", ApprovalDecision::Approved)
                .unwrap();
        }
    }

    #[test]
    fn test_no_approvals_is_never_complete() {
        let (coordinator, _, campaign_id) = setup();
        assert!(!coordinator.all_approvals_complete(campaign_id));
    }

    #[test]
    fn test_any_pending_or_rejected_blocks_completion() {
        let (coordinator, _, campaign_id) = setup();
        let summary = coordinator.trigger_approvals(campaign_id).unwrap();
        assert!(!summary.all_approved);

        let ids: Vec<Uuid> = summary.approvals.iter().map(|a| a.id).collect();
        coordinator.record_decision(ids[0], "po", ApprovalDecision::Approved).unwrap();
        coordinator.record_decision(ids[1], "risk", ApprovalDecision::Approved).unwrap();
        assert!(!coordinator.all_approvals_complete(campaign_id));

        coordinator.record_decision(ids[2], "ops", ApprovalDecision::Rejected).unwrap();
        assert!(!coordinator.all_approvals_complete(campaign_id));
    }

    #[test]
    fn test_single_approved_record_is_complete() {
        let (coordinator, _, campaign_id) = setup();
        coordinator
            .create_approval(NewApproval {
                campaign_id,
                role: "Product Owner".into(),
                actor: Some("po".into()),
                decision: ApprovalDecision::Approved,
            })
            .unwrap();
        assert!(coordinator.all_approvals_complete(campaign_id));
    }

    #[test]
    fn test_create_sets_timestamp_only_when_decided() {
        let (coordinator, _, campaign_id) = setup();
        let pending = coordinator
            .create_approval(NewApproval {
                campaign_id,
                role: "Risk/Compliance".into(),
                actor: None,
                decision: ApprovalDecision::Pending,
            })
            .unwrap();
        assert!(pending.timestamp.is_none());

        let rejected = coordinator
            .create_approval(NewApproval {
                campaign_id,
                role: "Marketing Ops".into(),
                actor: Some("ops".into()),
                decision: ApprovalDecision::Rejected,
            })
            .unwrap();
        assert!(rejected.timestamp.is_some());
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let (coordinator, _, campaign_id) = setup();
        let first = coordinator.trigger_approvals(campaign_id).unwrap();
        let second = coordinator.trigger_approvals(campaign_id).unwrap();

        let first_ids: Vec<Uuid> = first.approvals.iter().map(|a| a.id).collect();
        let second_ids: Vec<Uuid> = second.approvals.iter().map(|a| a.id).collect();
        assert_eq!(first_ids.len(), 3);
        assert_eq!(first_ids, second_ids);
        let roles: Vec<&str> = second.approvals.iter().map(|a| a.role.as_str()).collect();
        assert_eq!(roles, APPROVAL_ROLES.to_vec());
    }

    #[test]
    fn test_trigger_does_not_reset_decisions() {
        let (coordinator, _, campaign_id) = setup();
        coordinator.trigger_approvals(campaign_id).unwrap();
        approve_all(&coordinator, campaign_id);

        let summary = coordinator.trigger_approvals(campaign_id).unwrap();
        assert!(summary.all_approved);
        assert!(summary
            .approvals
            .iter()
            .all(|a| a.decision == ApprovalDecision::Approved));
    }

    #[test]
    fn test_trigger_fills_only_missing_roles() {
        let (coordinator, _, campaign_id) = setup();
        let existing = coordinator
            .create_approval(NewApproval {
                campaign_id,
                role: "Product Owner".into(),
                actor: Some("po".into()),
                decision: ApprovalDecision::Approved,
            })
            .unwrap();
        let summary = coordinator.trigger_approvals(campaign_id).unwrap();
        assert_eq!(summary.approvals.len(), 3);
        assert_eq!(summary.approvals[0].id, existing.id);
    }

    #[test]
    fn test_decision_cannot_be_changed() {
        let (coordinator, store, campaign_id) = setup();
        let summary = coordinator.trigger_approvals(campaign_id).unwrap();
        let id = summary.approvals[0].id;
        coordinator.record_decision(id, "po", ApprovalDecision::Rejected).unwrap();
        let err = coordinator
            .record_decision(id, "po", ApprovalDecision::Approved)
            .unwrap_err();
        assert!(matches!(err, CampaignError::InvalidTransition(_)));
        assert_eq!(
            store.approvals_for_campaign(campaign_id)[0].decision,
            ApprovalDecision::Rejected
        );
    }

    #[test]
    fn test_unknown_campaign_and_approval() {
        let (coordinator, _, _) = setup();
        assert!(matches!(
            coordinator.trigger_approvals(Uuid::new_v4()),
            Err(CampaignError::NotFound { .. })
        ));
        assert!(matches!(
            coordinator.record_decision(Uuid::new_v4(), "x", ApprovalDecision::Approved),
            Err(CampaignError::NotFound { .. })
        ));
    }
}
