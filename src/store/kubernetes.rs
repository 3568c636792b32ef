//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by the Kubernetes API server.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::crd::GeneratedSecret;
use crate::store::{ObjectStore, StoreError, KIND_GENERATED_SECRET, KIND_SECRET};

/// Store talking to the API server through a shared [`Client`]
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn resources(&self, namespace: &str) -> Api<GeneratedSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map API status codes onto the store error taxonomy
fn map_kube_error(error: kube::Error, kind: &'static str, namespace: &str, name: &str) -> StoreError {
    if let kube::Error::Api(response) = &error {
        match (response.code, response.reason.as_str()) {
            (404, _) => {
                return StoreError::NotFound {
                    kind,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                };
            }
            (409, "AlreadyExists") => {
                return StoreError::AlreadyExists {
                    kind,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                };
            }
            (409, _) => {
                return StoreError::Conflict {
                    kind,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    message: response.message.clone(),
                };
            }
            _ => {}
        }
    }
    StoreError::Api(error)
}

fn object_key<K: ResourceExt>(object: &K) -> (String, String) {
    (object.namespace().unwrap_or_default(), object.name_any())
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.secrets(namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_kube_error(e, KIND_SECRET, namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (namespace, name) = object_key(secret);
        debug!(secret.namespace = %namespace, secret.name = %name, "Creating secret");
        self.secrets(&namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|e| map_kube_error(e, KIND_SECRET, &namespace, &name))
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (namespace, name) = object_key(secret);
        debug!(secret.namespace = %namespace, secret.name = %name, "Replacing secret");
        self.secrets(&namespace)
            .replace(&name, &PostParams::default(), secret)
            .await
            .map_err(|e| map_kube_error(e, KIND_SECRET, &namespace, &name))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        debug!(secret.namespace = %namespace, secret.name = %name, "Deleting secret");
        self.secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, KIND_SECRET, namespace, name))
    }

    async fn get_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<GeneratedSecret>, StoreError> {
        self.resources(namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_kube_error(e, KIND_GENERATED_SECRET, namespace, name))
    }

    async fn update_resource(
        &self,
        resource: &GeneratedSecret,
    ) -> Result<GeneratedSecret, StoreError> {
        let (namespace, name) = object_key(resource);
        self.resources(&namespace)
            .replace(&name, &PostParams::default(), resource)
            .await
            .map_err(|e| map_kube_error(e, KIND_GENERATED_SECRET, &namespace, &name))
    }

    async fn update_resource_status(
        &self,
        resource: &GeneratedSecret,
    ) -> Result<GeneratedSecret, StoreError> {
        let (namespace, name) = object_key(resource);
        let body = serde_json::to_vec(resource)?;
        self.resources(&namespace)
            .replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|e| map_kube_error(e, KIND_GENERATED_SECRET, &namespace, &name))
    }
}
