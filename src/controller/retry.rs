//! # Refetch Retry
//!
//! Bounded read-merge-write loop for optimistic concurrency.
//!
//! Each attempt reads the latest object, merges local changes into it and
//! writes it back with the fresh resourceVersion. Retryable failures (conflicts
//! and transient store errors) back off exponentially with jitter, capped at
//! `max_delay`, until `max_attempts` is exhausted.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::config::ControllerConfig;
use crate::observability::metrics;
use crate::store::StoreError;

/// Attempt bound and backoff of a refetch-retry loop
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of write attempts (at least one is always made)
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            max_attempts: config.status_update_max_attempts,
            initial_delay: config.status_update_backoff_start_duration(),
            max_delay: config.status_update_backoff_max_duration(),
        }
    }

    /// Policy without sleeping between attempts
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Read the latest `T`, apply `merge`, and `write` it, retrying on conflict
///
/// Errors from `read` are returned immediately. Non-retryable write errors and
/// the last retryable one once attempts are exhausted are returned as-is.
pub async fn retry_with_refetch<T, R, RFut, M, W, WFut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut read: R,
    mut merge: M,
    mut write: W,
) -> Result<T, StoreError>
where
    R: FnMut() -> RFut,
    RFut: Future<Output = Result<T, StoreError>>,
    M: FnMut(&mut T),
    W: FnMut(T) -> WFut,
    WFut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let mut latest = read().await?;
        merge(&mut latest);

        match write(latest).await {
            Ok(written) => return Ok(written),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                if e.is_conflict() {
                    metrics::increment_write_conflicts();
                }
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);
                warn!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    delay_ms = jittered_delay.as_millis(),
                    "Write failed, refetching and retrying"
                );
                tokio::time::sleep(jittered_delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
            Err(e) => {
                if e.is_conflict() {
                    metrics::increment_write_conflicts();
                }
                error!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    "Write failed, giving up"
                );
                return Err(e);
            }
        }
    }
}
