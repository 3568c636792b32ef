//! # Secret Synchronization
//!
//! Fans the payload of a GeneratedSecret out to its target namespaces and keeps
//! the metadata of existing copies in line with the resource.
//!
//! - [`create_all`] creates a copy in every target namespace
//! - [`create_missing`] fills in namespaces lacking a valid copy, reusing the
//!   payload of an existing one
//! - [`reconcile_metadata`] re-applies labels and annotations to recorded copies
//! - [`prune_removed_namespaces`] drops copies in namespaces no longer targeted

use k8s_openapi::api::core::v1::Secret;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::controller::reconciler::labels::{
    build_secret, expected_labels, is_owned_by, matches_desired, metadata_matches, secret_ref,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{DeletionPolicy, GeneratedSecret, GeneratedSecretRef};
use crate::events::{actions, reasons};
use crate::generation::Payload;
use crate::observability::metrics;
use crate::store::StoreError;

/// Per-copy failure of a fan-out
#[derive(Debug, Error)]
pub enum CopyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("secret {namespace}/{name} exists and is not owned by this GeneratedSecret")]
    NotOwned { namespace: String, name: String },
    #[error("secret {namespace}/{name} has no UID")]
    MissingUid { namespace: String, name: String },
}

/// Aggregated result of creating copies in several namespaces
#[derive(Debug, Default)]
pub struct FanOut {
    /// Identities of the copies now in place
    pub refs: Vec<GeneratedSecretRef>,
    pub failed: usize,
}

impl FanOut {
    #[must_use]
    pub fn had_errors(&self) -> bool {
        self.failed > 0
    }
}

/// Result of re-applying metadata to recorded copies
#[derive(Debug, Default)]
pub struct MetadataSync {
    /// Refs still recorded after the pass
    pub refs: Vec<GeneratedSecretRef>,
    /// Live copies that passed the data check
    pub live: Vec<Secret>,
}

/// Put the desired copy in place in `namespace`
///
/// An existing copy owned by `resource` differing from the desired state is
/// updated; one lacking the ownership labels is left untouched.
async fn ensure_copy(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    namespace: &str,
    payload: &Payload,
) -> Result<Secret, CopyError> {
    let desired = build_secret(resource, namespace, payload);
    let name = resource.secret_name();

    let secret = match ctx.store.create_secret(&desired).await {
        Ok(created) => {
            metrics::increment_secrets_created();
            ctx.record(
                resource,
                EventType::Normal,
                reasons::SECRET_CREATED,
                actions::GENERATE,
                format!("Created secret {name} in namespace {namespace}"),
            )
            .await;
            created
        }
        Err(e) if e.is_already_exists() => {
            let existing = ctx.store.get_secret(namespace, &name).await?.ok_or_else(|| {
                StoreError::NotFound {
                    kind: crate::store::KIND_SECRET,
                    namespace: namespace.to_string(),
                    name: name.clone(),
                }
            })?;
            if !is_owned_by(resource, &existing) {
                return Err(CopyError::NotOwned {
                    namespace: namespace.to_string(),
                    name,
                });
            }
            if matches_desired(resource, &existing, payload) {
                debug!(secret.namespace = %namespace, secret.name = %name, "Adopted existing secret");
                existing
            } else {
                let mut replacement = desired;
                replacement.metadata.resource_version = existing.resource_version();
                let updated = ctx.store.update_secret(&replacement).await?;
                metrics::increment_secrets_updated();
                ctx.record(
                    resource,
                    EventType::Normal,
                    reasons::SECRET_UPDATED,
                    actions::GENERATE,
                    format!("Updated existing secret {name} in namespace {namespace}"),
                )
                .await;
                updated
            }
        }
        Err(e) => return Err(e.into()),
    };

    if secret.uid().unwrap_or_default().is_empty() {
        return Err(CopyError::MissingUid {
            namespace: namespace.to_string(),
            name,
        });
    }
    Ok(secret)
}

/// Create copies in `namespaces`, counting per-copy failures
async fn fan_out(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    namespaces: &[String],
    payload: &Payload,
) -> FanOut {
    let mut result = FanOut::default();
    for namespace in namespaces {
        match ensure_copy(ctx, resource, namespace, payload).await {
            Ok(secret) => result.refs.push(secret_ref(&secret)),
            Err(e) => {
                warn!(
                    secret.namespace = %namespace,
                    error = %e,
                    "Failed to create secret"
                );
                result.failed += 1;
                ctx.record(
                    resource,
                    EventType::Warning,
                    reasons::SECRET_CREATE_FAILED,
                    actions::GENERATE,
                    format!(
                        "Failed to create secret {} in namespace {namespace}: {e}",
                        resource.secret_name()
                    ),
                )
                .await;
            }
        }
    }
    result
}

/// Create a copy carrying `payload` in every target namespace
pub async fn create_all(ctx: &Reconciler, resource: &GeneratedSecret, payload: &Payload) -> FanOut {
    let namespaces = resource.target_namespaces();
    info!(
        resource.name = %resource.name_any(),
        namespaces = namespaces.len(),
        "Creating secrets"
    );
    fan_out(ctx, resource, &namespaces, payload).await
}

/// Create copies in target namespaces without a valid one
///
/// The first entry of `valid` is the canonical payload source; namespaces of
/// every entry are skipped.
pub async fn create_missing(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    valid: &[Secret],
) -> Result<FanOut, ReconcilerError> {
    let source = valid.first().ok_or_else(|| {
        ReconcilerError::InvalidState("no valid secret to copy the payload from".to_string())
    })?;
    let payload = source.data.clone().unwrap_or_default();

    let missing: Vec<String> = resource
        .target_namespaces()
        .into_iter()
        .filter(|ns| !valid.iter().any(|s| s.namespace().as_deref() == Some(ns.as_str())))
        .collect();
    if missing.is_empty() {
        return Ok(FanOut::default());
    }

    debug!(
        resource.name = %resource.name_any(),
        missing = ?missing,
        "Creating missing secrets"
    );
    Ok(fan_out(ctx, resource, &missing, &payload).await)
}

/// Whether a live copy still holds data for every template key
fn has_expected_data(resource: &GeneratedSecret, secret: &Secret) -> bool {
    match secret.data.as_ref() {
        Some(data) if !data.is_empty() => resource
            .spec
            .template
            .data
            .keys()
            .all(|key| data.contains_key(key)),
        _ => false,
    }
}

/// Re-apply declared labels and annotations to every recorded copy
///
/// Copies that vanished or lost template keys are dropped so they get
/// recreated. An object no longer owned by `resource`, or carrying another
/// UID than the one recorded, is dropped without being touched. Copies that
/// cannot be fetched or updated keep their ref.
pub async fn reconcile_metadata(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    refs: &[GeneratedSecretRef],
) -> MetadataSync {
    let mut result = MetadataSync::default();

    for recorded in refs {
        let live = match ctx.store.get_secret(&recorded.namespace, &recorded.name).await {
            Ok(Some(live)) => live,
            Ok(None) => {
                info!(
                    secret.namespace = %recorded.namespace,
                    secret.name = %recorded.name,
                    "Managed secret was deleted"
                );
                continue;
            }
            Err(e) => {
                warn!(
                    secret.namespace = %recorded.namespace,
                    error = %e,
                    "Failed to fetch managed secret"
                );
                result.refs.push(recorded.clone());
                continue;
            }
        };

        if !is_owned_by(resource, &live) || live.uid().unwrap_or_default() != recorded.uid {
            warn!(
                secret.namespace = %recorded.namespace,
                secret.name = %recorded.name,
                "Recorded secret was replaced outside the controller, dropping it"
            );
            continue;
        }

        if !has_expected_data(resource, &live) {
            info!(
                secret.namespace = %recorded.namespace,
                secret.name = %recorded.name,
                "Secret data is empty or incomplete, marking for regeneration"
            );
            continue;
        }

        if metadata_matches(resource, &live) {
            result.refs.push(secret_ref(&live));
            result.live.push(live);
            continue;
        }

        let mut patched = live.clone();
        patched.metadata.labels = Some(expected_labels(resource));
        patched.metadata.annotations = Some(resource.spec.metadata.annotations.clone());
        match ctx.store.update_secret(&patched).await {
            Ok(updated) => {
                metrics::increment_secrets_updated();
                ctx.record(
                    resource,
                    EventType::Normal,
                    reasons::SECRET_UPDATED,
                    actions::RECONCILE,
                    format!(
                        "Updated metadata of secret {} in namespace {}",
                        recorded.name, recorded.namespace
                    ),
                )
                .await;
                result.refs.push(secret_ref(&updated));
                result.live.push(updated);
            }
            Err(e) => {
                warn!(
                    secret.namespace = %recorded.namespace,
                    error = %e,
                    "Failed to update secret metadata"
                );
                result.refs.push(recorded.clone());
            }
        }
    }

    result
}

/// Drop refs in namespaces that are no longer targeted
///
/// Under the `Delete` policy the owned copies in those namespaces are deleted
/// as well, including the ones recorded in `invalid`. Returns the refs of
/// `refs` that stay recorded.
pub async fn prune_removed_namespaces(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    refs: Vec<GeneratedSecretRef>,
    invalid: &[GeneratedSecretRef],
) -> Vec<GeneratedSecretRef> {
    let targets = resource.target_namespaces();
    let is_targeted = |r: &GeneratedSecretRef| targets.binary_search(&r.namespace).is_ok();
    let (kept, removed): (Vec<_>, Vec<_>) = refs.into_iter().partition(|r| is_targeted(r));

    if resource.spec.deletion_policy == DeletionPolicy::Delete {
        let stale = removed
            .iter()
            .chain(invalid.iter().filter(|r| !is_targeted(r)));
        for stale in stale {
            delete_owned_copy(ctx, resource, stale).await;
        }
    }
    kept
}

async fn delete_owned_copy(ctx: &Reconciler, resource: &GeneratedSecret, stale: &GeneratedSecretRef) {
    match ctx.store.get_secret(&stale.namespace, &stale.name).await {
        Ok(Some(secret)) if is_owned_by(resource, &secret) => {
            match ctx.store.delete_secret(&stale.namespace, &stale.name).await {
                Ok(()) => {
                    metrics::increment_secrets_deleted();
                    info!(
                        secret.namespace = %stale.namespace,
                        secret.name = %stale.name,
                        "Deleted secret in namespace no longer targeted"
                    );
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(
                    secret.namespace = %stale.namespace,
                    error = %e,
                    "Failed to delete secret in namespace no longer targeted"
                ),
            }
        }
        Ok(_) => {}
        Err(e) => warn!(
            secret.namespace = %stale.namespace,
            error = %e,
            "Failed to fetch secret in namespace no longer targeted"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::constants::LABEL_OWNER_REF;
    use crate::controller::retry::RetryPolicy;
    use crate::crd::{GeneratedSecretSpec, SecretMetadata};
    use crate::events::RecordingEventPublisher;
    use crate::store::InMemoryStore;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct Harness {
        store: Arc<InMemoryStore>,
        events: Arc<RecordingEventPublisher>,
        ctx: Reconciler,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let ctx = Reconciler::new(store.clone(), events.clone(), ControllerConfig::default())
            .with_retry_policy(RetryPolicy::immediate(3));
        Harness { store, events, ctx }
    }

    fn resource(namespaces: &[&str]) -> GeneratedSecret {
        let mut gs = GeneratedSecret::new(
            "gs",
            GeneratedSecretSpec {
                metadata: SecretMetadata {
                    name: "app-creds".to_string(),
                    namespaces: namespaces.iter().map(|s| (*s).to_string()).collect(),
                    labels: BTreeMap::from([("team".to_string(), "payments".to_string())]),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        gs.metadata.namespace = Some("platform".to_string());
        gs.metadata.uid = Some("uid-1".to_string());
        gs.spec
            .template
            .data
            .insert("PASSWORD".to_string(), crate::crd::ValueSpec::default());
        gs
    }

    fn payload(value: &str) -> Payload {
        Payload::from([("PASSWORD".to_string(), ByteString(value.as_bytes().to_vec()))])
    }

    #[tokio::test]
    async fn test_create_all_is_idempotent() {
        let h = harness();
        let gs = resource(&["b", "a"]);

        let first = create_all(&h.ctx, &gs, &payload("s3cr3t")).await;
        assert!(!first.had_errors());
        assert_eq!(first.refs.len(), 2);
        assert_eq!(first.refs[0].namespace, "a");

        let writes = h.store.secret_writes();
        let second = create_all(&h.ctx, &gs, &payload("s3cr3t")).await;
        assert!(!second.had_errors());
        assert_eq!(second.refs, first.refs);
        assert_eq!(h.store.secret_writes(), writes);
        assert_eq!(h.events.count(reasons::SECRET_CREATED), 2);
    }

    #[tokio::test]
    async fn test_adopted_copy_with_other_payload_is_rewritten() {
        let h = harness();
        let gs = resource(&["a"]);
        create_all(&h.ctx, &gs, &payload("old")).await;

        let result = create_all(&h.ctx, &gs, &payload("new")).await;
        assert!(!result.had_errors());
        let stored = h.store.secret("a", "app-creds").unwrap();
        assert_eq!(stored.data.unwrap()["PASSWORD"].0, b"new");
        assert_eq!(h.events.count(reasons::SECRET_UPDATED), 1);
    }

    #[tokio::test]
    async fn test_foreign_secret_is_never_mutated() {
        let h = harness();
        let gs = resource(&["a"]);
        let mut foreign = build_secret(&gs, "a", &payload("theirs"));
        foreign
            .labels_mut()
            .insert(LABEL_OWNER_REF.to_string(), "someone-else".to_string());
        let foreign = h.store.insert_secret(foreign);

        let result = create_all(&h.ctx, &gs, &payload("ours")).await;
        assert_eq!(result.failed, 1);
        assert!(result.refs.is_empty());
        assert_eq!(h.store.secret("a", "app-creds"), Some(foreign));
        assert_eq!(h.events.count(reasons::SECRET_CREATE_FAILED), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_is_counted() {
        let h = harness();
        let gs = resource(&["a", "b", "c"]);
        h.store.fail_creates_in("b");

        let result = create_all(&h.ctx, &gs, &payload("x")).await;
        assert_eq!(result.failed, 1);
        let namespaces: Vec<&str> = result.refs.iter().map(|r| r.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_create_missing_copies_canonical_payload() {
        let h = harness();
        let gs = resource(&["a"]);
        create_all(&h.ctx, &gs, &payload("canonical")).await;
        let source = h.store.secret("a", "app-creds").unwrap();

        let gs = resource(&["a", "b"]);
        let result = create_missing(&h.ctx, &gs, &[source]).await.unwrap();
        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].namespace, "b");
        assert_eq!(
            h.store.secret("b", "app-creds").unwrap().data,
            h.store.secret("a", "app-creds").unwrap().data
        );
    }

    #[tokio::test]
    async fn test_create_missing_without_valid_copy_fails() {
        let h = harness();
        let err = create_missing(&h.ctx, &resource(&["a"]), &[]).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_reconcile_metadata_restores_labels() {
        let h = harness();
        let gs = resource(&["a"]);
        let created = create_all(&h.ctx, &gs, &payload("x")).await;
        h.store.modify_secret("a", "app-creds", |s| {
            s.labels_mut().remove("team");
        });

        let sync = reconcile_metadata(&h.ctx, &gs, &created.refs).await;
        assert_eq!(h.events.count(reasons::SECRET_UPDATED), 1);
        assert_eq!(sync.refs.len(), 1);
        let stored = h.store.secret("a", "app-creds").unwrap();
        assert_eq!(stored.labels()["team"], "payments");
        assert_eq!(sync.refs[0], secret_ref(&stored));
    }

    #[tokio::test]
    async fn test_reconcile_metadata_drops_incomplete_copies() {
        let h = harness();
        let gs = resource(&["a", "b"]);
        let created = create_all(&h.ctx, &gs, &payload("x")).await;
        h.store.modify_secret("a", "app-creds", |s| s.data = None);
        h.store.remove_secret("b", "app-creds");

        let sync = reconcile_metadata(&h.ctx, &gs, &created.refs).await;
        assert!(sync.refs.is_empty());
        assert!(sync.live.is_empty());
    }

    #[tokio::test]
    async fn test_prune_deletes_owned_copies_under_delete_policy() {
        let h = harness();
        let gs = resource(&["a", "b"]);
        let created = create_all(&h.ctx, &gs, &payload("x")).await;

        let narrowed = resource(&["a"]);
        let kept = prune_removed_namespaces(&h.ctx, &narrowed, created.refs.clone(), &[]).await;
        assert_eq!(kept.len(), 1);
        assert!(h.store.secret("b", "app-creds").is_none());

        let mut retained = resource(&["b"]);
        retained.spec.deletion_policy = DeletionPolicy::Retain;
        let kept = prune_removed_namespaces(&h.ctx, &retained, created.refs, &[]).await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].namespace, "b");
        assert!(h.store.secret("a", "app-creds").is_some());
    }

    #[tokio::test]
    async fn test_reconcile_metadata_leaves_replaced_secret_alone() {
        let h = harness();
        let gs = resource(&["a"]);
        let created = create_all(&h.ctx, &gs, &payload("ours")).await;
        h.store.remove_secret("a", "app-creds");
        let mut foreign = build_secret(&gs, "a", &payload("theirs"));
        foreign.metadata.labels = None;
        let foreign = h.store.insert_secret(foreign);

        let sync = reconcile_metadata(&h.ctx, &gs, &created.refs).await;
        assert!(sync.refs.is_empty());
        assert!(sync.live.is_empty());
        assert_eq!(h.store.secret("a", "app-creds"), Some(foreign));
    }

    #[tokio::test]
    async fn test_reconcile_metadata_drops_copy_with_other_uid() {
        let h = harness();
        let gs = resource(&["a"]);
        let mut created = create_all(&h.ctx, &gs, &payload("x")).await;
        created.refs[0].uid = "stale-uid".to_string();
        let writes = h.store.secret_writes();

        let sync = reconcile_metadata(&h.ctx, &gs, &created.refs).await;
        assert!(sync.refs.is_empty());
        assert_eq!(h.store.secret_writes(), writes);
    }

    #[tokio::test]
    async fn test_prune_deletes_invalid_copy_in_removed_namespace() {
        let h = harness();
        let gs = resource(&["a", "b"]);
        let created = create_all(&h.ctx, &gs, &payload("x")).await;
        let edited_b = created.refs[1].clone();
        h.store.modify_secret("b", "app-creds", |s| {
            s.annotations_mut().insert("edited".to_string(), "true".to_string());
        });

        let narrowed = resource(&["a"]);
        let kept =
            prune_removed_namespaces(&h.ctx, &narrowed, vec![created.refs[0].clone()], &[edited_b])
                .await;
        assert_eq!(kept.len(), 1);
        assert!(h.store.secret("b", "app-creds").is_none());
        assert!(h.store.secret("a", "app-creds").is_some());
    }
}
