//! # Reconciler
//!
//! Core reconciliation logic for `GeneratedSecret` resources.
//!
//! The reconciler:
//! - Attaches a finalizer to every GeneratedSecret
//! - Generates the payload once and fans it out to every target namespace
//! - Detects copies modified outside the controller and restores them
//! - Keeps labels and annotations of the copies in line with the resource
//! - Deletes or retains the copies when the resource is deleted
//!
//! ## Reconciliation Flow
//!
//! 1. Validate the resource
//! 2. Classify recorded copies as valid, invalid or unreadable
//! 3. Drop copies in namespaces no longer targeted
//! 4. Without a valid copy: generate a payload and create every copy
//! 5. Otherwise: re-sync metadata and create missing copies from a valid one
//! 6. Update status

pub mod classify;
pub mod cleanup;
pub mod conditions;
pub mod labels;
pub mod reconcile;
pub mod status;
pub mod sync;
pub mod types;
pub mod validation;

// Re-export public API
pub use reconcile::{reconcile, Lifecycle};
pub use types::{Reconciler, ReconcilerError};
pub use validation::{validate_generated_secret, ValidationError};
