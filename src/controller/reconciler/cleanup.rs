//! # Cleanup
//!
//! Deletes the copies of a terminating GeneratedSecret according to its
//! deletion policy. Cleanup is re-entrant: copies already gone are skipped.

use std::collections::BTreeSet;

use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{info, warn};

use crate::controller::reconciler::labels::is_owned_by;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{DeletionPolicy, GeneratedSecret};
use crate::events::{actions, reasons};
use crate::observability::metrics;
use crate::store::StoreError;

/// Every (namespace, name) a copy may live at: recorded refs and current targets
fn candidate_copies(resource: &GeneratedSecret) -> BTreeSet<(String, String)> {
    let mut candidates: BTreeSet<(String, String)> = resource
        .status
        .iter()
        .flat_map(|status| status.secrets_generated_ref.secrets.iter())
        .map(|r| (r.namespace.clone(), r.name.clone()))
        .collect();
    let name = resource.secret_name();
    candidates.extend(
        resource
            .target_namespaces()
            .into_iter()
            .map(|ns| (ns, name.clone())),
    );
    candidates
}

/// Delete one copy if it exists and is owned by `resource`
///
/// Returns whether a copy was deleted.
async fn delete_copy(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    namespace: &str,
    name: &str,
) -> Result<bool, StoreError> {
    let Some(secret) = ctx.store.get_secret(namespace, name).await? else {
        return Ok(false);
    };
    if !is_owned_by(resource, &secret) {
        info!(
            secret.namespace = %namespace,
            secret.name = %name,
            "Skipping secret not owned by this GeneratedSecret"
        );
        return Ok(false);
    }
    match ctx.store.delete_secret(namespace, name).await {
        Ok(()) => {
            metrics::increment_secrets_deleted();
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Run cleanup for a terminating resource
///
/// Under `Retain` nothing is deleted. Under `Delete` every failure is counted
/// and reported through one `CleanupFailed` event; the finalizer must stay
/// until a later attempt succeeds.
pub async fn cleanup_secrets(ctx: &Reconciler, resource: &GeneratedSecret) -> Result<(), ReconcilerError> {
    if resource.spec.deletion_policy == DeletionPolicy::Retain {
        info!(
            resource.name = %resource.name_any(),
            "Deletion policy is Retain, keeping generated secrets"
        );
        return Ok(());
    }

    let candidates = candidate_copies(resource);
    let total = candidates.len();
    let mut failed = 0usize;
    let mut deleted = 0usize;
    for (namespace, name) in &candidates {
        match delete_copy(ctx, resource, namespace, name).await {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(
                    secret.namespace = %namespace,
                    secret.name = %name,
                    error = %e,
                    "Failed to delete generated secret"
                );
                failed += 1;
            }
        }
    }

    if failed > 0 {
        ctx.record(
            resource,
            EventType::Warning,
            reasons::CLEANUP_FAILED,
            actions::CLEANUP,
            format!("Failed to delete {failed} of {total} generated secrets"),
        )
        .await;
        return Err(ReconcilerError::Cleanup { failed, total });
    }

    info!(resource.name = %resource.name_any(), deleted, "Deleted generated secrets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::reconciler::labels::{build_secret, secret_ref};
    use crate::crd::{GeneratedSecretSpec, GeneratedSecretStatus, GeneratedSecretsRef, SecretMetadata};
    use crate::events::RecordingEventPublisher;
    use crate::generation::Payload;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    fn resource(policy: DeletionPolicy) -> GeneratedSecret {
        let mut gs = GeneratedSecret::new(
            "gs",
            GeneratedSecretSpec {
                metadata: SecretMetadata {
                    namespaces: vec!["a".to_string(), "b".to_string()],
                    ..Default::default()
                },
                deletion_policy: policy,
                ..Default::default()
            },
        );
        gs.metadata.namespace = Some("platform".to_string());
        gs.metadata.uid = Some("uid-1".to_string());
        gs
    }

    fn with_copies(store: &InMemoryStore, mut gs: GeneratedSecret) -> GeneratedSecret {
        let refs = ["a", "b"]
            .iter()
            .map(|ns| secret_ref(&store.insert_secret(build_secret(&gs, ns, &Payload::new()))))
            .collect();
        gs.status = Some(GeneratedSecretStatus {
            secrets_generated_ref: GeneratedSecretsRef { secrets: refs },
            ..Default::default()
        });
        gs
    }

    fn ctx(store: Arc<InMemoryStore>, events: Arc<RecordingEventPublisher>) -> Reconciler {
        Reconciler::new(store, events, ControllerConfig::default())
    }

    #[tokio::test]
    async fn test_delete_policy_removes_copies() {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let gs = with_copies(&store, resource(DeletionPolicy::Delete));

        cleanup_secrets(&ctx(store.clone(), events.clone()), &gs).await.unwrap();
        assert!(store.secrets_named("gs").is_empty());
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_is_reentrant() {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let gs = with_copies(&store, resource(DeletionPolicy::Delete));
        store.remove_secret("a", "gs");

        let ctx = ctx(store.clone(), events);
        cleanup_secrets(&ctx, &gs).await.unwrap();
        cleanup_secrets(&ctx, &gs).await.unwrap();
        assert!(store.secrets_named("gs").is_empty());
    }

    #[tokio::test]
    async fn test_retain_policy_keeps_copies() {
        let store = Arc::new(InMemoryStore::new());
        let gs = with_copies(&store, resource(DeletionPolicy::Retain));

        cleanup_secrets(&ctx(store.clone(), Arc::new(RecordingEventPublisher::new())), &gs)
            .await
            .unwrap();
        assert_eq!(store.secrets_named("gs").len(), 2);
    }

    #[tokio::test]
    async fn test_foreign_secret_survives_cleanup() {
        let store = Arc::new(InMemoryStore::new());
        let gs = resource(DeletionPolicy::Delete);
        let mut foreign = build_secret(&gs, "a", &Payload::new());
        foreign.metadata.labels = None;
        store.insert_secret(foreign);

        cleanup_secrets(&ctx(store.clone(), Arc::new(RecordingEventPublisher::new())), &gs)
            .await
            .unwrap();
        assert!(store.secret("a", "gs").is_some());
    }

    #[tokio::test]
    async fn test_failures_emit_cleanup_failed() {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let gs = with_copies(&store, resource(DeletionPolicy::Delete));
        store.fail_gets_in("b");

        let err = cleanup_secrets(&ctx(store.clone(), events.clone()), &gs)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcilerError::Cleanup { failed: 1, total: 2 }));
        assert_eq!(events.reasons(), vec![reasons::CLEANUP_FAILED.to_string()]);
        assert!(store.secret("a", "gs").is_none());
    }
}
