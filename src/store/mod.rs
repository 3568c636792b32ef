//! # Object Store
//!
//! The key-value object store the reconciler reads and writes through.
//!
//! Objects carry a UID and a resourceVersion. Create fails with
//! [`StoreError::AlreadyExists`], updates carrying a stale resourceVersion fail
//! with [`StoreError::Conflict`], and deleting a missing object fails with
//! [`StoreError::NotFound`].
//!
//! - `kubernetes.rs` - Kubernetes API backed store
//! - `memory.rs` - In-memory store with fault injection, used by the test suites

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;

use crate::crd::GeneratedSecret;

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeStore;
pub use memory::InMemoryStore;

pub const KIND_SECRET: &str = "Secret";
pub const KIND_GENERATED_SECRET: &str = "GeneratedSecret";

/// Errors returned by an [`ObjectStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
        message: String,
    },
    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether repeating the same request after a refetch may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } | Self::Unavailable(_) => true,
            Self::Api(kube::Error::Api(response)) => {
                response.code == 429 || response.code >= 500
            }
            Self::Api(_) => true,
            Self::NotFound { .. } | Self::AlreadyExists { .. } | Self::Serialization(_) => false,
        }
    }
}

/// Object store operations needed by the reconciler
///
/// Secrets are addressed by `(namespace, name)`. Resource writes are split into
/// a metadata/spec update (finalizers) and a status subresource update.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a secret, `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    /// Create a secret, returning the stored object with its UID and resourceVersion
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replace a secret. The resourceVersion of `secret` is used as a precondition when set
    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Fetch a GeneratedSecret, `None` when it does not exist
    async fn get_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<GeneratedSecret>, StoreError>;

    /// Replace metadata and spec of a GeneratedSecret
    async fn update_resource(&self, resource: &GeneratedSecret)
        -> Result<GeneratedSecret, StoreError>;

    /// Replace the status subresource of a GeneratedSecret
    async fn update_resource_status(
        &self,
        resource: &GeneratedSecret,
    ) -> Result<GeneratedSecret, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let conflict = StoreError::Conflict {
            kind: KIND_SECRET,
            namespace: "a".to_string(),
            name: "s".to_string(),
            message: "stale".to_string(),
        };
        assert!(conflict.is_conflict());
        assert!(conflict.is_retryable());

        let not_found = StoreError::NotFound {
            kind: KIND_SECRET,
            namespace: "a".to_string(),
            name: "s".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());

        assert!(StoreError::Unavailable("down".to_string()).is_retryable());
    }

    #[test]
    fn test_display_names_object() {
        let err = StoreError::AlreadyExists {
            kind: KIND_GENERATED_SECRET,
            namespace: "platform".to_string(),
            name: "db".to_string(),
        };
        assert_eq!(err.to_string(), "GeneratedSecret platform/db already exists");
    }
}
