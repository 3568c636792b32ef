//! # Classification
//!
//! Sorts the recorded copies of a GeneratedSecret by comparing each recorded
//! identity with the live object.

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::crd::{GeneratedSecret, GeneratedSecretRef};
use crate::store::ObjectStore;

/// Outcome of comparing recorded refs with live copies
#[derive(Debug, Default)]
pub struct Classification {
    /// Copies whose uid, resourceVersion and type match the recorded ref
    pub valid: Vec<(GeneratedSecretRef, Secret)>,
    /// Copies modified or replaced outside the controller
    pub invalid: Vec<GeneratedSecretRef>,
    /// Refs that could not be fetched this cycle
    pub unknown: Vec<GeneratedSecretRef>,
}

impl Classification {
    /// Refs that stay recorded: valid and unknown, in namespace order
    #[must_use]
    pub fn retained_refs(&self) -> Vec<GeneratedSecretRef> {
        let mut refs: Vec<GeneratedSecretRef> = self
            .valid
            .iter()
            .map(|(r, _)| r.clone())
            .chain(self.unknown.iter().cloned())
            .collect();
        refs.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        refs
    }

    #[must_use]
    pub fn is_valid(&self, namespace: &str) -> bool {
        self.valid.iter().any(|(r, _)| r.namespace == namespace)
    }
}

/// Why a live copy does not match its recorded identity, if it does not
fn mismatch(recorded: &GeneratedSecretRef, live: &Secret) -> Option<&'static str> {
    if live.uid().unwrap_or_default() != recorded.uid {
        Some("uid")
    } else if live.resource_version().unwrap_or_default() != recorded.resource_version {
        Some("resourceVersion")
    } else if live.type_.clone().unwrap_or_default() != recorded.r#type {
        Some("type")
    } else {
        None
    }
}

/// Fetch every recorded copy and classify it
///
/// A copy that no longer exists is dropped from all buckets.
pub async fn classify_secrets(store: &dyn ObjectStore, resource: &GeneratedSecret) -> Classification {
    let mut classification = Classification::default();
    let Some(status) = resource.status.as_ref() else {
        return classification;
    };

    for recorded in &status.secrets_generated_ref.secrets {
        match store.get_secret(&recorded.namespace, &recorded.name).await {
            Ok(Some(live)) => match mismatch(recorded, &live) {
                None => classification.valid.push((recorded.clone(), live)),
                Some(field) => {
                    warn!(
                        secret.namespace = %recorded.namespace,
                        secret.name = %recorded.name,
                        field,
                        "Secret has been modified outside the controller"
                    );
                    classification.invalid.push(recorded.clone());
                }
            },
            Ok(None) => {
                debug!(
                    secret.namespace = %recorded.namespace,
                    secret.name = %recorded.name,
                    "Recorded secret no longer exists"
                );
            }
            Err(e) => {
                warn!(
                    secret.namespace = %recorded.namespace,
                    secret.name = %recorded.name,
                    error = %e,
                    "Failed to fetch recorded secret"
                );
                classification.unknown.push(recorded.clone());
            }
        }
    }

    classification
}
