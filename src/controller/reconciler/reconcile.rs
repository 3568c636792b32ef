//! # Reconciliation Logic
//!
//! Lifecycle state machine for GeneratedSecret resources.
//!
//! 1. **Terminating**: run cleanup per deletion policy, then drop the finalizer
//! 2. **PendingFinalizer**: attach the finalizer and wait for the update
//! 3. **Active**: validate, classify recorded copies, then either generate a
//!    fresh payload and fan it out, or re-sync metadata and fill in missing
//!    copies from an existing valid one

use std::sync::Arc;
use std::time::Instant;

use kube::runtime::events::EventType;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{debug, info, warn, Instrument};

use crate::constants::{CONDITION_ERROR, CONDITION_READY};
use crate::controller::reconciler::classify::{classify_secrets, Classification};
use crate::controller::reconciler::cleanup::cleanup_secrets;
use crate::controller::reconciler::conditions::{remove_condition, set_condition};
use crate::controller::reconciler::status::{add_finalizer, remove_finalizer, write_status};
use crate::controller::reconciler::sync::{
    create_all, create_missing, prune_removed_namespaces, reconcile_metadata, FanOut,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::reconciler::validation::validate_generated_secret;
use crate::crd::{GeneratedSecret, GeneratedSecretRef, GeneratedSecretStatus};
use crate::events::{actions, reasons};
use crate::generation::Generator;
use crate::observability::metrics;

/// Lifecycle state of a GeneratedSecret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Deletion requested
    Terminating,
    /// Not deleting, finalizer not attached yet
    PendingFinalizer,
    /// Finalizer attached, not deleting
    Active,
}

impl Lifecycle {
    #[must_use]
    pub fn of(resource: &GeneratedSecret) -> Self {
        if resource.is_terminating() {
            Self::Terminating
        } else if resource.has_finalizer() {
            Self::Active
        } else {
            Self::PendingFinalizer
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminating => "Terminating",
            Self::PendingFinalizer => "PendingFinalizer",
            Self::Active => "Active",
        }
    }
}

/// Main reconciliation function
///
/// The resource is re-read from the store so the state machine always works on
/// the latest version; a resource that no longer exists ends the reconcile.
/// Errors are turned into requeues by the error policy.
pub async fn reconcile(
    resource: Arc<GeneratedSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();
    metrics::increment_reconciliations();

    let span = tracing::info_span!(
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        resource.kind = "GeneratedSecret",
    );

    let result = reconcile_latest(&ctx, &namespace, &name)
        .instrument(span)
        .await;

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    result
}

async fn reconcile_latest(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    let Some(latest) = ctx.store.get_resource(namespace, name).await? else {
        debug!("GeneratedSecret no longer exists, nothing to reconcile");
        return Ok(Action::await_change());
    };

    let lifecycle = Lifecycle::of(&latest);
    debug!(lifecycle = lifecycle.as_str(), "Reconciling GeneratedSecret");
    match lifecycle {
        Lifecycle::Terminating => reconcile_terminating(ctx, &latest).await,
        Lifecycle::PendingFinalizer => reconcile_pending_finalizer(ctx, &latest).await,
        Lifecycle::Active => reconcile_active(ctx, &latest).await,
    }
}

async fn reconcile_terminating(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
) -> Result<Action, ReconcilerError> {
    if !resource.has_finalizer() {
        return Ok(Action::await_change());
    }

    cleanup_secrets(ctx, resource).await?;
    remove_finalizer(ctx, resource).await?;

    info!(
        policy = ?resource.spec.deletion_policy,
        "Cleanup finished, finalizer removed"
    );
    ctx.record(
        resource,
        EventType::Normal,
        reasons::CLEANUP_SUCCEEDED,
        actions::CLEANUP,
        format!(
            "Cleaned up generated secrets (deletion policy {:?})",
            resource.spec.deletion_policy
        ),
    )
    .await;
    Ok(Action::await_change())
}

async fn reconcile_pending_finalizer(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
) -> Result<Action, ReconcilerError> {
    add_finalizer(ctx, resource).await?;
    ctx.record(
        resource,
        EventType::Normal,
        reasons::FINALIZER_ADDED,
        actions::RECONCILE,
        "Finalizer added".to_string(),
    )
    .await;
    Ok(Action::await_change())
}

/// Mark the resource failed with `reason` and persist the status
async fn record_failure(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    mut status: GeneratedSecretStatus,
    reason: &str,
    message: &str,
) -> Result<(), ReconcilerError> {
    let generation = resource.observed_generation();
    set_condition(&mut status.conditions, CONDITION_ERROR, "True", reason, message, generation);
    set_condition(&mut status.conditions, CONDITION_READY, "False", reason, message, generation);
    write_status(ctx, resource, &status)
        .await
        .map_err(ReconcilerError::StatusUpdate)?;
    Ok(())
}

async fn reconcile_active(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
) -> Result<Action, ReconcilerError> {
    let status = resource.status.clone().unwrap_or_default();

    if let Err(e) = validate_generated_secret(resource) {
        let message = e.to_string();
        warn!(error = %message, "GeneratedSecret failed validation");
        ctx.record(
            resource,
            EventType::Warning,
            reasons::VALIDATION_FAILED,
            actions::RECONCILE,
            message.clone(),
        )
        .await;
        record_failure(ctx, resource, status, "ValidationFailed", &message).await?;
        return Err(e.into());
    }

    let classification = classify_secrets(&*ctx.store, resource).await;
    report_drift(ctx, resource, &classification).await;
    let refs = prune_removed_namespaces(
        ctx,
        resource,
        classification.retained_refs(),
        &classification.invalid,
    )
    .await;

    let has_valid = refs.iter().any(|r| classification.is_valid(&r.namespace));
    let (refs, fan_out, generated) = if has_valid {
        let metadata = reconcile_metadata(ctx, resource, &refs).await;
        let valid_live: Vec<_> = metadata
            .live
            .into_iter()
            .filter(|s| classification.is_valid(&s.namespace().unwrap_or_default()))
            .collect();
        if valid_live.is_empty() {
            regenerate(ctx, resource, status.clone(), metadata.refs).await?
        } else {
            let fan_out = create_missing(ctx, resource, &valid_live).await?;
            (metadata.refs, fan_out, false)
        }
    } else {
        regenerate(ctx, resource, status.clone(), refs).await?
    };

    finalize(ctx, resource, status, refs, &fan_out, generated).await
}

async fn report_drift(ctx: &Reconciler, resource: &GeneratedSecret, classification: &Classification) {
    for invalid in &classification.invalid {
        metrics::increment_drift_detected();
        ctx.record(
            resource,
            EventType::Warning,
            reasons::SECRET_MODIFIED,
            actions::RECONCILE,
            format!(
                "Secret {} in namespace {} has been modified outside the controller",
                invalid.name, invalid.namespace
            ),
        )
        .await;
    }
}

/// Generate a fresh payload and create every copy from it
///
/// Refusing to regenerate while recorded copies could not be read keeps a
/// transient read failure from rotating values. A generation failure is
/// persisted and returned before any copy is written.
async fn regenerate(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    mut status: GeneratedSecretStatus,
    unresolved: Vec<GeneratedSecretRef>,
) -> Result<(Vec<GeneratedSecretRef>, FanOut, bool), ReconcilerError> {
    if !unresolved.is_empty() {
        return Err(ReconcilerError::InvalidState(format!(
            "{} recorded secrets could not be verified, refusing to regenerate",
            unresolved.len()
        )));
    }

    let payload = match Generator::new(&*ctx.store)
        .generate(&resource.spec.template, &resource.resource_namespace())
        .await
    {
        Ok(payload) => payload,
        Err(e) => {
            metrics::increment_generation_failures();
            let message = format!("Failed to generate secret values: {e}");
            warn!(error = %e, "Failed to generate secret values");
            ctx.record(
                resource,
                EventType::Warning,
                reasons::GENERATION_FAILED,
                actions::GENERATE,
                message.clone(),
            )
            .await;
            status.secrets_generated_ref.secrets.clear();
            status.secrets_count = 0;
            record_failure(ctx, resource, status, e.reason(), &message).await?;
            return Err(e.into());
        }
    };

    let fan_out = create_all(ctx, resource, &payload).await;
    Ok((Vec::new(), fan_out, true))
}

/// Persist refs, counts and conditions after a fan-out
///
/// Per-copy failures leave Ready=False with an Error condition and requeue
/// after the error delay so failed namespaces get another attempt.
async fn finalize(
    ctx: &Reconciler,
    resource: &GeneratedSecret,
    mut status: GeneratedSecretStatus,
    mut refs: Vec<GeneratedSecretRef>,
    fan_out: &FanOut,
    generated: bool,
) -> Result<Action, ReconcilerError> {
    for created in &fan_out.refs {
        refs.retain(|r| r.namespace != created.namespace);
        refs.push(created.clone());
    }
    refs.sort_by(|a, b| a.namespace.cmp(&b.namespace));

    let generation = resource.observed_generation();
    let expected = resource.target_namespaces().len();
    status.secrets_count = i32::try_from(refs.len()).unwrap_or(i32::MAX);
    status.secrets_generated_ref.secrets = refs;
    status.initialized = true;

    let action = if fan_out.had_errors() {
        let created = status.secrets_count;
        set_condition(
            &mut status.conditions,
            CONDITION_ERROR,
            "True",
            reasons::SECRET_CREATE_FAILED,
            "Some secrets failed to be created",
            generation,
        );
        set_condition(
            &mut status.conditions,
            CONDITION_READY,
            "False",
            reasons::SECRET_CREATE_FAILED,
            &format!("Created {created} of {expected} secrets"),
            generation,
        );
        Action::requeue(ctx.config.reconciliation_error_requeue_duration())
    } else {
        let count = status.secrets_count;
        set_condition(
            &mut status.conditions,
            CONDITION_READY,
            "True",
            reasons::SECRETS_GENERATED,
            &format!("Successfully generated {count} secret(s)"),
            generation,
        );
        remove_condition(&mut status.conditions, CONDITION_ERROR);
        Action::await_change()
    };

    if generated && !fan_out.refs.is_empty() {
        ctx.record(
            resource,
            EventType::Normal,
            reasons::SECRETS_GENERATED,
            actions::GENERATE,
            format!("Generated {} of {expected} secret(s)", fan_out.refs.len()),
        )
        .await;
    }

    write_status(ctx, resource, &status)
        .await
        .map_err(ReconcilerError::StatusUpdate)?;
    Ok(action)
}
