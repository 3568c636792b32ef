//! # GeneratedSecret Spec
//!
//! Main CRD specification types and the accessors the reconciler derives from them.

use std::collections::BTreeMap;

use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::constants::FINALIZER_NAME;
use crate::crd::SecretTemplate;

/// Secret kind used when `metadata.type` is not set.
pub const DEFAULT_SECRET_KIND: &str = "Opaque";

/// GeneratedSecret Custom Resource Definition
///
/// Declares secret material that is generated once and materialized as one
/// `Secret` per target namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: secret-management.octopilot.io/v1
/// kind: GeneratedSecret
/// metadata:
///   name: postgres-credentials
///   namespace: platform
/// spec:
///   metadata:
///     name: postgres
///     namespaces: [app-a, app-b]
///   template:
///     data:
///       PASSWORD:
///         generated:
///           minLength: 16
///           maxLength: 32
///           maxDigits: 4
///       USERNAME:
///         value: app
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema,
)]
#[kube(
    kind = "GeneratedSecret",
    group = "secret-management.octopilot.io",
    version = "v1",
    namespaced,
    status = "crate::crd::GeneratedSecretStatus",
    shortname = "gs",
    printcolumn = r#"{"name":"Secrets", "type":"integer", "jsonPath":".status.secretsCount"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSecretSpec {
    /// Informational classification of the generated material
    #[serde(default)]
    pub secret_type: SecretType,
    /// Metadata stamped on every generated copy
    #[serde(default)]
    pub metadata: SecretMetadata,
    /// Per-key value specifications
    #[serde(default)]
    pub template: SecretTemplate,
    /// What happens to the copies when the resource is deleted
    /// Default: Delete
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Informational secret classification
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub enum SecretType {
    #[default]
    Opaque,
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "basic-auth")]
    BasicAuth,
    #[serde(rename = "ssh-auth")]
    SshAuth,
}

/// Deletion policy for generated copies
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub enum DeletionPolicy {
    /// Delete every recorded copy before the finalizer is removed
    #[default]
    Delete,
    /// Leave the copies in place
    Retain,
}

/// Metadata of the generated secret copies
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadata {
    /// Name of every copy. Falls back to the resource name when empty.
    #[serde(default)]
    pub name: String,
    /// Target namespaces, one copy per namespace
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Labels added to each copy, alongside the ownership labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotations added to each copy
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Kubernetes secret type (e.g. `kubernetes.io/basic-auth`). Default: Opaque
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl GeneratedSecret {
    /// Name given to every copy
    #[must_use]
    pub fn secret_name(&self) -> String {
        if self.spec.metadata.name.is_empty() {
            self.name_any()
        } else {
            self.spec.metadata.name.clone()
        }
    }

    /// Target namespaces, sorted and de-duplicated
    #[must_use]
    pub fn target_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self
            .spec
            .metadata
            .namespaces
            .iter()
            .filter(|ns| !ns.is_empty())
            .cloned()
            .collect();
        namespaces.sort();
        namespaces.dedup();
        namespaces
    }

    /// Kubernetes secret type of the copies
    #[must_use]
    pub fn secret_kind(&self) -> String {
        match self.spec.metadata.kind.as_deref() {
            Some(kind) if !kind.is_empty() => kind.to_string(),
            _ => DEFAULT_SECRET_KIND.to_string(),
        }
    }

    /// Namespace of the resource itself, used as the default for input secret lookups
    #[must_use]
    pub fn resource_namespace(&self) -> String {
        self.namespace().unwrap_or_default()
    }

    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER_NAME)
    }

    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Observed generation stamped on conditions
    #[must_use]
    pub fn observed_generation(&self) -> Option<i64> {
        self.metadata.generation
    }
}
