//! # In-Memory Store
//!
//! [`ObjectStore`] kept in process memory with the same optimistic concurrency
//! semantics as the API server: UIDs are assigned on create, every write bumps
//! a store-wide resourceVersion, and a stale resourceVersion is a conflict.
//!
//! Faults can be injected to exercise partial failures:
//! - [`InMemoryStore::fail_creates_in`] makes secret creation fail in a namespace
//! - [`InMemoryStore::fail_gets_in`] makes secret reads fail in a namespace
//! - [`InMemoryStore::inject_status_conflicts`] makes the next status writes conflict

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;

use crate::crd::GeneratedSecret;
use crate::store::{ObjectStore, StoreError, KIND_GENERATED_SECRET, KIND_SECRET};

type ObjectKey = (String, String);

#[derive(Debug, Default)]
struct State {
    secrets: BTreeMap<ObjectKey, Secret>,
    resources: BTreeMap<ObjectKey, GeneratedSecret>,
    last_resource_version: u64,
    failing_create_namespaces: BTreeSet<String>,
    failing_get_namespaces: BTreeSet<String>,
    failing_next_get_namespaces: BTreeSet<String>,
    pending_status_conflicts: u32,
    status_writes: u32,
    secret_writes: u32,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.last_resource_version += 1;
        self.last_resource_version.to_string()
    }
}

/// Process-local object store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn key_of<K: ResourceExt>(object: &K) -> ObjectKey {
    (object.namespace().unwrap_or_default(), object.name_any())
}

fn not_found(kind: &'static str, (namespace, name): &ObjectKey) -> StoreError {
    StoreError::NotFound {
        kind,
        namespace: namespace.clone(),
        name: name.clone(),
    }
}

fn conflict(kind: &'static str, (namespace, name): &ObjectKey, message: &str) -> StoreError {
    StoreError::Conflict {
        kind,
        namespace: namespace.clone(),
        name: name.clone(),
        message: message.to_string(),
    }
}

/// A write carrying a resourceVersion must match the stored one
fn check_precondition(
    kind: &'static str,
    key: &ObjectKey,
    stored: Option<&String>,
    incoming: Option<&String>,
) -> Result<(), StoreError> {
    match incoming {
        Some(version) if Some(version) != stored => Err(conflict(
            kind,
            key,
            "the object has been modified; please apply your changes to the latest version",
        )),
        _ => Ok(()),
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a GeneratedSecret as if it was applied by a user
    ///
    /// Assigns UID, resourceVersion and generation 1.
    pub fn insert_resource(&self, mut resource: GeneratedSecret) -> GeneratedSecret {
        let mut state = self.lock();
        resource.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        resource.metadata.generation = Some(1);
        resource.metadata.resource_version = Some(state.next_resource_version());
        state.resources.insert(key_of(&resource), resource.clone());
        resource
    }

    /// Store a secret directly, bypassing fault injection
    pub fn insert_secret(&self, mut secret: Secret) -> Secret {
        let mut state = self.lock();
        if secret.metadata.uid.is_none() {
            secret.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        secret.metadata.resource_version = Some(state.next_resource_version());
        state.secrets.insert(key_of(&secret), secret.clone());
        secret
    }

    /// Mutate a stored secret out-of-band; the resourceVersion is bumped
    pub fn modify_secret(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut Secret)) -> bool {
        let mut state = self.lock();
        let version = state.next_resource_version();
        match state
            .secrets
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            Some(secret) => {
                edit(secret);
                secret.metadata.resource_version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Remove a stored secret out-of-band
    pub fn remove_secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock()
            .secrets
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// Mutate the spec of a stored GeneratedSecret, bumping generation and resourceVersion
    pub fn modify_resource(
        &self,
        namespace: &str,
        name: &str,
        edit: impl FnOnce(&mut GeneratedSecret),
    ) -> bool {
        let mut state = self.lock();
        let version = state.next_resource_version();
        match state
            .resources
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            Some(resource) => {
                edit(resource);
                resource.metadata.generation = Some(resource.metadata.generation.unwrap_or(0) + 1);
                resource.metadata.resource_version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Set the deletion timestamp of a stored GeneratedSecret, as a delete request would
    ///
    /// A resource without finalizers is removed immediately.
    pub fn mark_for_deletion(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let timestamp: Time =
            serde_json::from_value(serde_json::Value::String(chrono::Utc::now().to_rfc3339()))?;
        let key = (namespace.to_string(), name.to_string());
        let mut state = self.lock();
        let version = state.next_resource_version();
        let resource = state
            .resources
            .get_mut(&key)
            .ok_or_else(|| not_found(KIND_GENERATED_SECRET, &key))?;
        resource.metadata.deletion_timestamp = Some(timestamp);
        resource.metadata.resource_version = Some(version);
        if resource.finalizers().is_empty() {
            state.resources.remove(&key);
        }
        Ok(())
    }

    pub fn fail_creates_in(&self, namespace: &str) {
        self.lock()
            .failing_create_namespaces
            .insert(namespace.to_string());
    }

    pub fn fail_gets_in(&self, namespace: &str) {
        self.lock()
            .failing_get_namespaces
            .insert(namespace.to_string());
    }

    /// Fail only the next secret read in `namespace`
    pub fn fail_next_get_in(&self, namespace: &str) {
        self.lock()
            .failing_next_get_namespaces
            .insert(namespace.to_string());
    }

    /// Clear all injected faults
    pub fn heal(&self) {
        let mut state = self.lock();
        state.failing_create_namespaces.clear();
        state.failing_get_namespaces.clear();
        state.failing_next_get_namespaces.clear();
        state.pending_status_conflicts = 0;
    }

    /// Make the next `count` status writes fail with a conflict
    pub fn inject_status_conflicts(&self, count: u32) {
        self.lock().pending_status_conflicts = count;
    }

    #[must_use]
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn resource(&self, namespace: &str, name: &str) -> Option<GeneratedSecret> {
        self.lock()
            .resources
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// All stored secrets named `name`, ordered by namespace
    #[must_use]
    pub fn secrets_named(&self, name: &str) -> Vec<Secret> {
        self.lock()
            .secrets
            .iter()
            .filter(|((_, n), _)| n == name)
            .map(|(_, s)| s.clone())
            .collect()
    }

    /// Number of accepted status writes
    #[must_use]
    pub fn status_writes(&self) -> u32 {
        self.lock().status_writes
    }

    /// Number of accepted secret creates and updates
    #[must_use]
    pub fn secret_writes(&self) -> u32 {
        self.lock().secret_writes
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let mut state = self.lock();
        if state.failing_next_get_namespaces.remove(namespace)
            || state.failing_get_namespaces.contains(namespace)
        {
            return Err(StoreError::Unavailable(format!(
                "injected read failure in namespace {namespace}"
            )));
        }
        Ok(state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = key_of(secret);
        let mut state = self.lock();
        if state.failing_create_namespaces.contains(&key.0) {
            return Err(StoreError::Unavailable(format!(
                "injected create failure in namespace {}",
                key.0
            )));
        }
        if state.secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: KIND_SECRET,
                namespace: key.0,
                name: key.1,
            });
        }
        let mut stored = secret.clone();
        stored.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        stored.metadata.resource_version = Some(state.next_resource_version());
        if stored.type_.is_none() {
            stored.type_ = Some(crate::crd::DEFAULT_SECRET_KIND.to_string());
        }
        state.secrets.insert(key, stored.clone());
        state.secret_writes += 1;
        Ok(stored)
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = key_of(secret);
        let mut state = self.lock();
        let current = state
            .secrets
            .get(&key)
            .ok_or_else(|| not_found(KIND_SECRET, &key))?;
        check_precondition(
            KIND_SECRET,
            &key,
            current.metadata.resource_version.as_ref(),
            secret.metadata.resource_version.as_ref(),
        )?;
        let uid = current.metadata.uid.clone();
        let mut stored = secret.clone();
        stored.metadata.uid = uid;
        stored.metadata.resource_version = Some(state.next_resource_version());
        state.secrets.insert(key, stored.clone());
        state.secret_writes += 1;
        Ok(stored)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = (namespace.to_string(), name.to_string());
        self.lock()
            .secrets
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| not_found(KIND_SECRET, &key))
    }

    async fn get_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<GeneratedSecret>, StoreError> {
        Ok(self.resource(namespace, name))
    }

    async fn update_resource(
        &self,
        resource: &GeneratedSecret,
    ) -> Result<GeneratedSecret, StoreError> {
        let key = key_of(resource);
        let mut state = self.lock();
        let current = state
            .resources
            .get(&key)
            .ok_or_else(|| not_found(KIND_GENERATED_SECRET, &key))?;
        check_precondition(
            KIND_GENERATED_SECRET,
            &key,
            current.metadata.resource_version.as_ref(),
            resource.metadata.resource_version.as_ref(),
        )?;
        let mut stored = resource.clone();
        stored.status.clone_from(&current.status);
        stored.metadata.uid.clone_from(&current.metadata.uid);
        stored.metadata.generation = current.metadata.generation;
        stored
            .metadata
            .deletion_timestamp
            .clone_from(&current.metadata.deletion_timestamp);
        stored.metadata.resource_version = Some(state.next_resource_version());
        if stored.is_terminating() && stored.finalizers().is_empty() {
            state.resources.remove(&key);
        } else {
            state.resources.insert(key, stored.clone());
        }
        Ok(stored)
    }

    async fn update_resource_status(
        &self,
        resource: &GeneratedSecret,
    ) -> Result<GeneratedSecret, StoreError> {
        let key = key_of(resource);
        let mut state = self.lock();
        if state.pending_status_conflicts > 0 {
            state.pending_status_conflicts -= 1;
            return Err(conflict(KIND_GENERATED_SECRET, &key, "injected status conflict"));
        }
        let version = state.next_resource_version();
        let current = state
            .resources
            .get_mut(&key)
            .ok_or_else(|| not_found(KIND_GENERATED_SECRET, &key))?;
        check_precondition(
            KIND_GENERATED_SECRET,
            &key,
            current.metadata.resource_version.as_ref(),
            resource.metadata.resource_version.as_ref(),
        )?;
        current.status.clone_from(&resource.status);
        current.metadata.resource_version = Some(version);
        let stored = current.clone();
        state.status_writes += 1;
        Ok(stored)
    }
}
