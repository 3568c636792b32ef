//! # Custom Resource Definitions
//!
//! CRD types for the Generated Secret Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `GeneratedSecret` resource, secret metadata and derived accessors
//! - `template.rs` - Per-key value specifications (value, static, templated, generated)
//! - `status.rs` - Status types for tracking generated copies and conditions

mod spec;
mod status;
mod template;

pub use spec::{
    DeletionPolicy, GeneratedSecret, GeneratedSecretSpec, SecretMetadata, SecretType,
    DEFAULT_SECRET_KIND,
};
pub use status::{Condition, GeneratedSecretRef, GeneratedSecretStatus, GeneratedSecretsRef};
pub use template::{
    GeneratedValueSpec, InputSecretRef, SecretTemplate, StaticValueSpec, TemplatedValueSpec,
    ValueSource, ValueSpec,
};
