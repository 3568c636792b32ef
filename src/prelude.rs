//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use generated_secret_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (GeneratedSecret, SecretTemplate, ValueSpec, etc.)
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - The store and event publisher seams
//! - Config types

// CRD types - most commonly used
pub use crate::crd::*;

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, Lifecycle, Reconciler, ReconcilerError, ValidationError,
};
pub use crate::controller::retry::RetryPolicy;

// Store and event seams
pub use crate::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
pub use crate::store::{InMemoryStore, KubeStore, ObjectStore, StoreError};

// Value generation
pub use crate::generation::{GenerationError, Generator, Payload};

// Config types
pub use crate::config::{ControllerConfig, LogFormat};
