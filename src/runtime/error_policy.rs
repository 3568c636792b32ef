//! # Error Policy
//!
//! Error handling for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::GeneratedSecret;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Handle reconciliation errors with a fixed-delay requeue
///
/// Every failure is retried after `RECONCILIATION_ERROR_REQUEUE_SECS`; partial
/// progress already persisted by the reconcile is kept.
pub fn handle_reconciliation_error(
    obj: Arc<GeneratedSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %name,
        resource.namespace = %namespace,
        error.reason = error.reason(),
    );
    let _error_guard = error_span.enter();

    if is_transient(error) {
        warn!(error = %error, "Reconciliation failed, will retry");
    } else {
        error!(error = %error, "Reconciliation failed");
    }
    metrics::increment_reconciliation_errors();

    let delay = ctx.config.reconciliation_error_requeue_duration();
    warn!(delay_secs = delay.as_secs(), "Requeueing after reconciliation error");
    Action::requeue(delay)
}

/// How the watch loop reacts to an error on the controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorAction {
    /// Keep consuming the stream
    Continue,
    /// Back off, then keep consuming the stream
    Backoff(Duration),
}

/// Classify a controller stream error
///
/// Object-not-found errors come from resources deleted between the event and
/// the reconcile and are expected. Anything else backs off before continuing.
#[must_use]
pub fn classify_stream_error(error_string: &str, restart_delay: Duration) -> WatchErrorAction {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if is_not_found {
        warn!(error = %error_string, "Object not found, it may have been deleted");
        return WatchErrorAction::Continue;
    }

    let is_expired = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired");
    if is_expired {
        warn!("Watch resource version expired (410), watch will resync");
        return WatchErrorAction::Continue;
    }

    error!(error = %error_string, "Controller stream error");
    WatchErrorAction::Backoff(restart_delay)
}

/// Whether a reconcile error is a store error the next attempt may clear
#[must_use]
pub fn is_transient(error: &ReconcilerError) -> bool {
    match error {
        ReconcilerError::Store(e) | ReconcilerError::StatusUpdate(e) => e.is_retryable(),
        ReconcilerError::InvalidState(_) | ReconcilerError::Cleanup { .. } => true,
        ReconcilerError::Validation(_) | ReconcilerError::Generation(_) => false,
    }
}
