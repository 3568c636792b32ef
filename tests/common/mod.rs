//! Common test utilities for reconciliation tests
//!
//! Builds a reconciler over an [`InMemoryStore`] and a
//! [`RecordingEventPublisher`] and drives it the way the controller would.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use std::collections::BTreeMap;
use std::sync::Arc;

use generated_secret_controller::config::ControllerConfig;
use generated_secret_controller::controller::reconciler::{reconcile, Reconciler, ReconcilerError};
use generated_secret_controller::controller::retry::RetryPolicy;
use generated_secret_controller::crd::{
    Condition, DeletionPolicy, GeneratedSecret, GeneratedSecretSpec, GeneratedValueSpec,
    SecretMetadata, SecretTemplate, ValueSpec,
};
use generated_secret_controller::events::RecordingEventPublisher;
use generated_secret_controller::store::InMemoryStore;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;

pub const RESOURCE_NAMESPACE: &str = "platform";
pub const RESOURCE_NAME: &str = "db-creds";

/// Reconciler wired to in-memory fakes
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub events: Arc<RecordingEventPublisher>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let reconciler = Reconciler::new(store.clone(), events.clone(), config)
            .with_retry_policy(RetryPolicy::immediate(5));
        Self {
            store,
            events,
            reconciler: Arc::new(reconciler),
        }
    }

    /// Store `resource` as if it was applied by a user
    pub fn apply(&self, resource: GeneratedSecret) -> GeneratedSecret {
        self.store.insert_resource(resource)
    }

    /// Run one reconcile against the stored resource
    pub async fn reconcile(&self) -> Result<Action, ReconcilerError> {
        let resource = self
            .store
            .resource(RESOURCE_NAMESPACE, RESOURCE_NAME)
            .unwrap_or_else(|| generated_secret(&["unused"], BTreeMap::new()));
        reconcile(Arc::new(resource), Arc::clone(&self.reconciler)).await
    }

    /// Attach the finalizer, then run the first active reconcile
    pub async fn reconcile_until_active(&self) -> Result<Action, ReconcilerError> {
        let action = self.reconcile().await.expect("finalizer pass should succeed");
        assert_eq!(action, Action::await_change());
        self.reconcile().await
    }

    pub fn current(&self) -> GeneratedSecret {
        self.store
            .resource(RESOURCE_NAMESPACE, RESOURCE_NAME)
            .expect("resource should exist")
    }

    pub fn condition(&self, type_: &str) -> Option<Condition> {
        self.current()
            .status
            .unwrap_or_default()
            .conditions
            .into_iter()
            .find(|c| c.r#type == type_)
    }

    pub fn copies(&self) -> Vec<Secret> {
        self.store.secrets_named(RESOURCE_NAME)
    }
}

/// A GeneratedSecret in [`RESOURCE_NAMESPACE`] targeting `namespaces`
pub fn generated_secret(namespaces: &[&str], data: BTreeMap<String, ValueSpec>) -> GeneratedSecret {
    let mut resource = GeneratedSecret::new(
        RESOURCE_NAME,
        GeneratedSecretSpec {
            metadata: SecretMetadata {
                namespaces: namespaces.iter().map(|ns| (*ns).to_string()).collect(),
                ..Default::default()
            },
            template: SecretTemplate { data },
            deletion_policy: DeletionPolicy::Delete,
            ..Default::default()
        },
    );
    resource.metadata.namespace = Some(RESOURCE_NAMESPACE.to_string());
    resource
}

pub fn generated(length: u32) -> ValueSpec {
    ValueSpec {
        generated: Some(GeneratedValueSpec {
            length,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn literal(value: &str) -> ValueSpec {
    ValueSpec {
        value: Some(value.to_string()),
        ..Default::default()
    }
}

pub fn data(entries: Vec<(&str, ValueSpec)>) -> BTreeMap<String, ValueSpec> {
    entries
        .into_iter()
        .map(|(key, spec)| (key.to_string(), spec))
        .collect()
}

/// Decoded value of `key` in `secret`
pub fn value_of(secret: &Secret, key: &str) -> String {
    let bytes = &secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .unwrap_or_else(|| panic!("secret should contain key {key}"))
        .0;
    String::from_utf8(bytes.clone()).expect("generated values are UTF-8")
}
