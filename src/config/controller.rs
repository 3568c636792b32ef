//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

use crate::constants::{
    DEFAULT_CONTROLLER_NAME, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, DEFAULT_STATUS_UPDATE_BACKOFF_MAX_MS,
    DEFAULT_STATUS_UPDATE_BACKOFF_START_MS, DEFAULT_STATUS_UPDATE_MAX_ATTEMPTS,
    DEFAULT_WATCH_RESTART_DELAY_SECS,
};

/// Output format of the process logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Reconciliation error requeue interval (seconds)
    /// How long to wait before retrying a failed reconciliation
    pub reconciliation_error_requeue_secs: u64,
    /// Attempts of the refetch-merge-write status loop before the conflict is surfaced
    pub status_update_max_attempts: u32,
    /// Status write backoff starting value (milliseconds)
    pub status_update_backoff_start_ms: u64,
    /// Status write backoff maximum value (milliseconds)
    pub status_update_backoff_max_ms: u64,
    /// Maximum concurrent reconciliations
    /// Limits how many resources can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    /// Used when `RUST_LOG` is not set
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: LogFormat,
    /// Namespace to watch. Empty watches all namespaces
    pub watch_namespace: Option<String>,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Reporting controller name on emitted events
    pub controller_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            status_update_max_attempts: DEFAULT_STATUS_UPDATE_MAX_ATTEMPTS,
            status_update_backoff_start_ms: DEFAULT_STATUS_UPDATE_BACKOFF_START_MS,
            status_update_backoff_max_ms: DEFAULT_STATUS_UPDATE_BACKOFF_MAX_MS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            log_level: "INFO".to_string(),
            log_format: LogFormat::Json,
            watch_namespace: None,
            metrics_port: DEFAULT_METRICS_PORT,
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let watch_namespace = env_var_or_default_str("WATCH_NAMESPACE", "");
        Self {
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            status_update_max_attempts: env_var_or_default(
                "STATUS_UPDATE_MAX_ATTEMPTS",
                DEFAULT_STATUS_UPDATE_MAX_ATTEMPTS,
            ),
            status_update_backoff_start_ms: env_var_or_default(
                "STATUS_UPDATE_BACKOFF_START_MS",
                DEFAULT_STATUS_UPDATE_BACKOFF_START_MS,
            ),
            status_update_backoff_max_ms: env_var_or_default(
                "STATUS_UPDATE_BACKOFF_MAX_MS",
                DEFAULT_STATUS_UPDATE_BACKOFF_MAX_MS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: LogFormat::parse(&env_var_or_default_str("LOG_FORMAT", "json")),
            watch_namespace: (!watch_namespace.is_empty()).then_some(watch_namespace),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            controller_name: env_var_or_default_str("CONTROLLER_NAME", DEFAULT_CONTROLLER_NAME),
        }
    }

    /// Get reconciliation error requeue duration
    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    #[must_use]
    pub fn status_update_backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.status_update_backoff_start_ms)
    }

    #[must_use]
    pub fn status_update_backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.status_update_backoff_max_ms)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
