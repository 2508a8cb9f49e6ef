pub mod config;
pub mod error;
pub mod random;
pub mod types;

pub use config::AppConfig;
pub use error::{CampaignError, CampaignResult};
pub use random::RandomSource;
