//! Campaign publication and simulation backend.
//!
//! Auto controls, role approvals, the guarded publish/go-live workflow, and
//! asynchronous simulation runs, exposed as REST endpoints. Data lives in
//! DashMap tables with JSON snapshots for durability.

pub mod approvals;
pub mod controls;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod router;
pub mod simulation;
pub mod store;
pub mod workflows;

pub use approvals::ApprovalCoordinator;
pub use controls::{ControlEvaluator, ControlPolicy};
pub use error::ApiError;
pub use handlers::ManagementState;
pub use router::management_router;
pub use simulation::SimulationEngine;
pub use store::ManagementStore;
pub use workflows::{PublicationWorkflow, PublishOutcome};
