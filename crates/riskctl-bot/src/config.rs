//! Application configuration.

use std::path::Path;

use riskctl_broker::DhanClientConfig;
use riskctl_core::SessionConfig;
use riskctl_jobs::{AccountingConfig, DEFAULT_FAN_OUT};
use riskctl_risk::StopLossConfig;
use riskctl_scheduler::TriggerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Registration settings for one scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub trigger: TriggerConfig,
    /// Instances of this job allowed to overlap.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_instances() -> usize {
    1
}

impl JobSettings {
    pub fn new(trigger: TriggerConfig, max_instances: usize) -> Self {
        Self {
            enabled: true,
            trigger,
            max_instances,
        }
    }
}

fn default_order_count_job() -> JobSettings {
    JobSettings::new(TriggerConfig::interval(2), 3)
}

fn default_quick_exit_job() -> JobSettings {
    JobSettings::new(TriggerConfig::interval(1), 3)
}

fn default_auto_stop_loss_job() -> JobSettings {
    JobSettings::new(TriggerConfig::interval(2), 2)
}

fn default_account_logger_job() -> JobSettings {
    JobSettings::new(TriggerConfig::interval(15), 10)
}

fn default_session_open_job() -> JobSettings {
    JobSettings::new(TriggerConfig::weekdays_at(9, 0), 1)
}

fn default_session_close_job() -> JobSettings {
    JobSettings::new(TriggerConfig::weekdays_at(15, 30), 1)
}

fn default_order_history_job() -> JobSettings {
    JobSettings::new(TriggerConfig::weekdays_at(15, 30), 1)
}

/// Every scheduled job. A section given in the file replaces the default
/// for that job as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Users processed concurrently inside one job instance.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
    #[serde(default = "default_order_count_job")]
    pub order_count: JobSettings,
    #[serde(default = "default_quick_exit_job")]
    pub quick_exit: JobSettings,
    #[serde(default = "default_auto_stop_loss_job")]
    pub auto_stop_loss: JobSettings,
    #[serde(default = "default_account_logger_job")]
    pub account_logger: JobSettings,
    #[serde(default = "default_session_open_job")]
    pub session_open: JobSettings,
    #[serde(default = "default_session_close_job")]
    pub session_close: JobSettings,
    #[serde(default = "default_order_history_job")]
    pub order_history: JobSettings,
}

fn default_fan_out() -> usize {
    DEFAULT_FAN_OUT
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            fan_out: default_fan_out(),
            order_count: default_order_count_job(),
            quick_exit: default_quick_exit_job(),
            auto_stop_loss: default_auto_stop_loss_job(),
            account_logger: default_account_logger_job(),
            session_open: default_session_open_job(),
            session_close: default_session_close_job(),
            order_history: default_order_history_job(),
        }
    }
}

/// Liveness ping. Disabled when no URL is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_heartbeat_interval_secs() -> u64 {
    180
}

fn default_heartbeat_timeout_secs() -> u64 {
    10
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: default_heartbeat_interval_secs(),
            timeout_secs: default_heartbeat_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Account whose elevated flag is restored at session close.
    #[serde(default)]
    pub dev_admin: Option<String>,
}

/// File-backed stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,
}

fn default_accounts_file() -> String {
    "./data/accounts.json".to_string()
}

fn default_audit_dir() -> String {
    "./data/audit".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            accounts_file: default_accounts_file(),
            audit_dir: default_audit_dir(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus metrics port. `0` disables the endpoint.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight job instances on shutdown.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

fn default_grace_secs() -> u64 {
    30
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
        }
    }
}

/// Top-level configuration, one section per concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: DhanClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub stop_loss: StopLossConfig,
    #[serde(default)]
    pub accounting: AccountingConfig,
    #[serde(default)]
    pub operator: OperatorConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that serde defaults cannot express.
    pub fn validate(&self) -> AppResult<()> {
        if self.jobs.fan_out == 0 {
            return Err(AppError::Config("jobs.fan_out must be at least 1".to_string()));
        }
        if self.broker.timeout_secs == 0 {
            return Err(AppError::Config(
                "broker.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.heartbeat.url.is_some() && self.heartbeat.interval_secs == 0 {
            return Err(AppError::Config(
                "heartbeat.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
