use thiserror::Error;
use uuid::Uuid;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Controls failed: {0}")]
    ControlsFailed(String),

    #[error("Simulation run {0} is leased by another worker")]
    LeaseLost(Uuid),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        CampaignError::NotFound { entity, id }
    }

    /// Stable machine-readable code for error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CampaignError::Validation(_) => "validation_error",
            CampaignError::NotFound { .. } => "not_found",
            CampaignError::PreconditionFailed(_) => "precondition_failed",
            CampaignError::ControlsFailed(_) => "controls_failed",
            CampaignError::LeaseLost(_) => "lease_lost",
            CampaignError::InvalidTransition(_) => "invalid_transition",
            CampaignError::Store(_) => "store_error",
            CampaignError::Config(_) => "config_error",
            CampaignError::Serialization(_) => "serialization_error",
            CampaignError::Io(_) => "io_error",
            CampaignError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_entity() {
        let id = Uuid::new_v4();
        let err = CampaignError::not_found("Simulation run", id);
        assert_eq!(err.to_string(), format!("Simulation run {} not found", id));
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn test_codes_are_distinct_for_workflow_failures() {
        let precondition = CampaignError::PreconditionFailed("x".into());
        let controls = CampaignError::ControlsFailed("y".into());
        assert_ne!(precondition.code(), controls.code());
    }
}
