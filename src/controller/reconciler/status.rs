//! # Status and Finalizer Writes
//!
//! Persists status and finalizer changes with refetch-and-retry so a stale
//! resourceVersion never drops a write.

use kube::ResourceExt;
use tracing::debug;

use crate::constants::FINALIZER_NAME;
use crate::controller::reconciler::types::Reconciler;
use crate::controller::retry::retry_with_refetch;
use crate::crd::{GeneratedSecret, GeneratedSecretStatus};
use crate::store::{ObjectStore, StoreError, KIND_GENERATED_SECRET};

fn resource_key(resource: &GeneratedSecret) -> (String, String) {
    (resource.namespace().unwrap_or_default(), resource.name_any())
}

/// Fetch the latest resource, treating absence as an error
async fn read_latest(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
) -> Result<GeneratedSecret, StoreError> {
    store
        .get_resource(namespace, name)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            kind: KIND_GENERATED_SECRET,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
}

/// Write `status` unless it equals the status `resource` was read with
///
/// Returns whether a write happened.
pub async fn write_status(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    status: &GeneratedSecretStatus,
) -> Result<bool, StoreError> {
    if resource.status.as_ref() == Some(status) {
        debug!(resource.name = %resource.name_any(), "Skipping status update - status unchanged");
        return Ok(false);
    }

    let (namespace, name) = resource_key(resource);
    let store = &*ctx.store;
    let (namespace, name) = (namespace.as_str(), name.as_str());
    retry_with_refetch(
        &ctx.retry_policy,
        "update_status",
        move || read_latest(store, namespace, name),
        |latest: &mut GeneratedSecret| latest.status = Some(status.clone()),
        move |latest: GeneratedSecret| async move { store.update_resource_status(&latest).await },
    )
    .await?;
    Ok(true)
}

/// Attach the controller finalizer
pub async fn add_finalizer(ctx: &Reconciler, resource: &GeneratedSecret) -> Result<(), StoreError> {
    let (namespace, name) = resource_key(resource);
    let store = &*ctx.store;
    let (namespace, name) = (namespace.as_str(), name.as_str());
    retry_with_refetch(
        &ctx.retry_policy,
        "add_finalizer",
        move || read_latest(store, namespace, name),
        |latest: &mut GeneratedSecret| {
            if !latest.has_finalizer() {
                latest.finalizers_mut().push(FINALIZER_NAME.to_string());
            }
        },
        move |latest: GeneratedSecret| async move { store.update_resource(&latest).await },
    )
    .await?;
    Ok(())
}

/// Detach the controller finalizer, letting the resource be garbage-collected
///
/// A resource that is already gone counts as success.
pub async fn remove_finalizer(ctx: &Reconciler, resource: &GeneratedSecret) -> Result<(), StoreError> {
    let (namespace, name) = resource_key(resource);
    let store = &*ctx.store;
    let (namespace, name) = (namespace.as_str(), name.as_str());
    let result = retry_with_refetch(
        &ctx.retry_policy,
        "remove_finalizer",
        move || read_latest(store, namespace, name),
        |latest: &mut GeneratedSecret| latest.finalizers_mut().retain(|f| f != FINALIZER_NAME),
        move |latest: GeneratedSecret| async move { store.update_resource(&latest).await },
    )
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}
