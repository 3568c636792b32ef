//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Finalizer attached to every GeneratedSecret before copies are created
pub const FINALIZER_NAME: &str = "generatedsecret.secret-management.octopilot.io/finalizer";

/// Ownership label: name of the owning GeneratedSecret
pub const LABEL_OWNER_NAME: &str = "generatedsecret.secret-management.octopilot.io/name";

/// Ownership label: namespace of the owning GeneratedSecret
pub const LABEL_OWNER_NAMESPACE: &str = "generatedsecret.secret-management.octopilot.io/namespace";

/// Ownership label: UID of the owning GeneratedSecret
pub const LABEL_OWNER_REF: &str = "generatedsecret.secret-management.octopilot.io/ref";

/// Default controller name, used as the event reporter
pub const DEFAULT_CONTROLLER_NAME: &str = "generated-secret-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default requeue interval for reconciliation errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default number of status write attempts before giving up
pub const DEFAULT_STATUS_UPDATE_MAX_ATTEMPTS: u32 = 5;

/// Default exponential backoff starting value for status writes (milliseconds)
pub const DEFAULT_STATUS_UPDATE_BACKOFF_START_MS: u64 = 10;

/// Default exponential backoff maximum value for status writes (milliseconds)
pub const DEFAULT_STATUS_UPDATE_BACKOFF_MAX_MS: u64 = 1000;

/// Default number of resources reconciled concurrently
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Condition type set once every copy exists
pub const CONDITION_READY: &str = "Ready";

/// Condition type set while the last cycle failed
pub const CONDITION_ERROR: &str = "Error";

/// Placeholder rendered for template fields missing from the input secret
pub const TEMPLATE_MISSING_VALUE: &str = "<no value>";
