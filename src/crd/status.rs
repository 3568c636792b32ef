//! # GeneratedSecret Status
//!
//! Status types for tracking generated copies and conditions.

use serde::{Deserialize, Serialize};

/// Status of the GeneratedSecret resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSecretStatus {
    /// Set once the payload has been generated and fanned out
    #[serde(default)]
    pub initialized: bool,
    /// Identity of every copy the controller created
    #[serde(default)]
    pub secrets_generated_ref: GeneratedSecretsRef,
    /// Conditions keyed by type (Ready, Error)
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Number of recorded copies
    #[serde(default)]
    pub secrets_count: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSecretsRef {
    #[serde(default)]
    pub secrets: Vec<GeneratedSecretRef>,
}

/// Recorded identity of a generated copy
///
/// `(type, resourceVersion, uid)` is the fingerprint compared against the live
/// object to detect out-of-band modification.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSecretRef {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub uid: String,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
    /// Generation of the resource the condition was computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl GeneratedSecretsRef {
    #[must_use]
    pub fn count(&self) -> i32 {
        i32::try_from(self.secrets.len()).unwrap_or(i32::MAX)
    }
}
