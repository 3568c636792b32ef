//! # Types
//!
//! Core types for the reconciler.

use std::sync::Arc;

use kube::runtime::events::EventType;
use kube::Resource;
use thiserror::Error;

use crate::config::ControllerConfig;
use crate::controller::reconciler::validation::ValidationError;
use crate::controller::retry::RetryPolicy;
use crate::crd::GeneratedSecret;
use crate::events::EventPublisher;
use crate::generation::GenerationError;
use crate::store::{ObjectStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to generate secret values: {0}")]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("cleanup failed for {failed} of {total} secrets")]
    Cleanup { failed: usize, total: usize },
    #[error("failed to update status: {0}")]
    StatusUpdate(#[source] StoreError),
}

impl ReconcilerError {
    /// Condition reason reported for this failure
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationFailed",
            Self::Generation(e) => e.reason(),
            Self::Store(_) | Self::InvalidState(_) => "Reconciling",
            Self::Cleanup { .. } => "CleanupFailed",
            Self::StatusUpdate(_) => "StatusUpdateFailed",
        }
    }
}

/// Shared reconcile context
///
/// Store and event handles are injected so the state machine runs against the
/// API server in production and against in-memory fakes in tests.
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventPublisher>,
    pub config: Arc<ControllerConfig>,
    pub retry_policy: RetryPolicy,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
    ) -> Self {
        let retry_policy = RetryPolicy::from_config(&config);
        Self {
            store,
            events,
            config: Arc::new(config),
            retry_policy,
        }
    }

    /// Replace the status/finalizer write retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Publish an event on `resource`
    pub(crate) async fn record(
        &self,
        resource: &GeneratedSecret,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        self.events
            .publish(&resource.object_ref(&()), type_, reason, action, Some(note))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KIND_SECRET;

    #[test]
    fn test_error_reasons() {
        let err = ReconcilerError::from(ValidationError::MissingNamespaces);
        assert_eq!(err.reason(), "ValidationFailed");

        let err = ReconcilerError::from(GenerationError::TemplateError {
            key: "DSN".to_string(),
            message: "unexpected end".to_string(),
        });
        assert_eq!(err.reason(), "TemplateError");

        let err = ReconcilerError::StatusUpdate(StoreError::Conflict {
            kind: KIND_SECRET,
            namespace: "a".to_string(),
            name: "b".to_string(),
            message: "stale".to_string(),
        });
        assert_eq!(err.reason(), "StatusUpdateFailed");
        assert_eq!(
            ReconcilerError::Cleanup { failed: 1, total: 2 }.to_string(),
            "cleanup failed for 1 of 2 secrets"
        );
    }
}
