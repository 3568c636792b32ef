//! # Validation
//!
//! Validates a GeneratedSecret before any secret is generated or written.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::crd::GeneratedSecret;

/// Allowed characters of a secret data key
static DATA_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-._a-zA-Z0-9]+$").expect("data key pattern is hardcoded and valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("metadata.namespaces must name at least one namespace")]
    MissingNamespaces,
    #[error("template.data must declare at least one key")]
    EmptyTemplate,
    #[error("template.data.{key}: exactly one of value, static, templated or generated must be set (found {found})")]
    AmbiguousValueSpec { key: String, found: usize },
    #[error("template.data key {key:?} must consist of alphanumeric characters, '-', '_' or '.'")]
    InvalidKey { key: String },
}

/// Validate target namespaces and every `template.data` entry
pub fn validate_generated_secret(resource: &GeneratedSecret) -> Result<(), ValidationError> {
    if resource.target_namespaces().is_empty() {
        return Err(ValidationError::MissingNamespaces);
    }
    if resource.spec.template.data.is_empty() {
        return Err(ValidationError::EmptyTemplate);
    }

    for (key, spec) in &resource.spec.template.data {
        if !DATA_KEY.is_match(key) {
            return Err(ValidationError::InvalidKey { key: key.clone() });
        }
        let found = spec.populated_variants();
        if found != 1 {
            return Err(ValidationError::AmbiguousValueSpec {
                key: key.clone(),
                found,
            });
        }
    }

    Ok(())
}
