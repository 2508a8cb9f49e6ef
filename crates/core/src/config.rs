use crate::error::{CampaignError, CampaignResult};
use serde::Deserialize;

/// Upper bound on a progression lease.
pub const MAX_LEASE_TTL_SECS: u64 = 86_400;

/// Root application configuration. Loaded from environment variables
/// with the prefix `OFFER_CONSOLE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Timing, failure injection and projection inputs for simulation runs.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Simulated processing latency before a step starts.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Simulated in-flight time between RUNNING and the terminal status.
    #[serde(default = "default_in_flight_delay_ms")]
    pub in_flight_delay_ms: u64,
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,
    /// Leading steps that never receive an injected failure.
    #[serde(default = "default_failure_exempt_steps")]
    pub failure_exempt_steps: usize,
    /// Cohort contribution of a segment without an estimated size.
    #[serde(default = "default_segment_size")]
    pub default_segment_size: u64,
    #[serde(default = "default_test_percentage")]
    pub test_percentage: f64,
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// Resume interrupted runs on start-up; when false they are marked orphaned.
    #[serde(default = "default_true")]
    pub resume_interrupted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlsConfig {
    /// `static` or `campaign_rules`.
    #[serde(default = "default_control_policy")]
    pub policy: String,
    #[serde(default = "default_max_error_rate_pct")]
    pub max_error_rate_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    #[serde(default)]
    pub seed_demo_data: bool,
}

// Default functions
fn default_instance_id() -> String {
    "console-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_step_delay_ms() -> u64 {
    1000
}
fn default_in_flight_delay_ms() -> u64 {
    500
}
fn default_failure_probability() -> f64 {
    0.05
}
fn default_failure_exempt_steps() -> usize {
    3
}
fn default_segment_size() -> u64 {
    10_000
}
fn default_test_percentage() -> f64 {
    10.0
}
fn default_duration_days() -> u32 {
    30
}
fn default_lease_ttl_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_control_policy() -> String {
    "static".to_string()
}
fn default_max_error_rate_pct() -> f64 {
    2.0
}
fn default_snapshot_interval_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            in_flight_delay_ms: default_in_flight_delay_ms(),
            failure_probability: default_failure_probability(),
            failure_exempt_steps: default_failure_exempt_steps(),
            default_segment_size: default_segment_size(),
            test_percentage: default_test_percentage(),
            duration_days: default_duration_days(),
            lease_ttl_secs: default_lease_ttl_secs(),
            resume_interrupted: default_true(),
        }
    }
}

impl SimulationConfig {
    /// Settings with no artificial latency, used by tests and local tooling.
    pub fn instant() -> Self {
        Self {
            step_delay_ms: 0,
            in_flight_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot run with. A lease must outlive one
    /// step's delays, or a second task could take a run over mid-step.
    pub fn validate(&self) -> CampaignResult<()> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(CampaignError::Config(format!(
                "simulation.failure_probability must be within [0, 1], got {}",
                self.failure_probability
            )));
        }
        if self.lease_ttl_secs == 0 || self.lease_ttl_secs > MAX_LEASE_TTL_SECS {
            return Err(CampaignError::Config(format!(
                "simulation.lease_ttl_secs must be within 1..={}, got {}",
                MAX_LEASE_TTL_SECS, self.lease_ttl_secs
            )));
        }
        let step_ms = self.step_delay_ms.saturating_add(self.in_flight_delay_ms);
        if self.lease_ttl_secs.saturating_mul(1_000) <= step_ms {
            return Err(CampaignError::Config(format!(
                "simulation.lease_ttl_secs ({}s) must exceed step_delay_ms + in_flight_delay_ms ({}ms)",
                self.lease_ttl_secs, step_ms
            )));
        }
        Ok(())
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            policy: default_control_policy(),
            max_error_rate_pct: default_max_error_rate_pct(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            snapshot_interval_secs: default_snapshot_interval_secs(),
            seed_demo_data: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            simulation: SimulationConfig::default(),
            controls: ControlsConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("OFFER_CONSOLE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
