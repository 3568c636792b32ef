//! # Value Generation
//!
//! Computes the payload of a GeneratedSecret once per generation cycle.
//!
//! - `password.rs` - Random password generation
//! - `template.rs` - Templated values rendered from an input secret
//!
//! Any failing key aborts the whole generation; the error names the key.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use thiserror::Error;
use tracing::debug;

use crate::crd::{SecretTemplate, TemplatedValueSpec, ValueSource};
use crate::store::{ObjectStore, StoreError};

pub mod password;
pub mod template;

pub use password::{generate_password, PasswordError, PasswordParams};
pub use template::TemplateRenderer;

/// Generated secret data, keyed like `template.data`
pub type Payload = BTreeMap<String, ByteString>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("key {key}: input secret {namespace}/{name} not found")]
    InputSecretNotFound {
        key: String,
        namespace: String,
        name: String,
    },
    #[error("key {key}: failed to fetch input secret {namespace}/{name}: {source}")]
    InputSecretFetch {
        key: String,
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("key {key}: inputSecretRef is required for templated values")]
    MissingInputSecretRef { key: String },
    #[error("key {key}: failed to render template: {message}")]
    TemplateError { key: String, message: String },
    #[error("key {key}: invalid generated value: {source}")]
    InvalidPasswordSpec {
        key: String,
        #[source]
        source: PasswordError,
    },
    #[error("key {key}: exactly one of value, static, templated or generated must be set")]
    InvalidValueSpec { key: String },
}

impl GenerationError {
    /// Condition reason reported for this failure
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InputSecretNotFound { .. } => "InputSecretNotFound",
            Self::TemplateError { .. } => "TemplateError",
            Self::InputSecretFetch { .. }
            | Self::MissingInputSecretRef { .. }
            | Self::InvalidPasswordSpec { .. }
            | Self::InvalidValueSpec { .. } => "GenerationFailed",
        }
    }
}

/// Resolves every key of a [`SecretTemplate`]
pub struct Generator<'a> {
    store: &'a dyn ObjectStore,
    renderer: TemplateRenderer,
}

impl std::fmt::Debug for Generator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator").finish_non_exhaustive()
    }
}

impl<'a> Generator<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Compute the payload. Input secrets are looked up in `default_namespace`
    /// unless the reference names one.
    pub async fn generate(
        &self,
        template: &SecretTemplate,
        default_namespace: &str,
    ) -> Result<Payload, GenerationError> {
        let mut payload = Payload::new();
        for (key, spec) in &template.data {
            let value = match spec.source() {
                Some(ValueSource::Literal(value)) => value.as_bytes().to_vec(),
                Some(ValueSource::Templated(templated)) => {
                    self.render(key, templated, default_namespace).await?.into_bytes()
                }
                Some(ValueSource::Generated(generated)) => generate_password(generated)
                    .map_err(|source| GenerationError::InvalidPasswordSpec {
                        key: key.clone(),
                        source,
                    })?
                    .as_bytes()
                    .to_vec(),
                None => return Err(GenerationError::InvalidValueSpec { key: key.clone() }),
            };
            payload.insert(key.clone(), ByteString(value));
        }
        debug!(keys = payload.len(), "Generated payload");
        Ok(payload)
    }

    async fn render(
        &self,
        key: &str,
        spec: &TemplatedValueSpec,
        default_namespace: &str,
    ) -> Result<String, GenerationError> {
        let input = spec
            .input_secret_ref
            .as_ref()
            .ok_or_else(|| GenerationError::MissingInputSecretRef {
                key: key.to_string(),
            })?;
        let namespace = match input.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => default_namespace,
        };

        let secret = self
            .store
            .get_secret(namespace, &input.name)
            .await
            .map_err(|source| GenerationError::InputSecretFetch {
                key: key.to_string(),
                namespace: namespace.to_string(),
                name: input.name.clone(),
                source,
            })?
            .ok_or_else(|| GenerationError::InputSecretNotFound {
                key: key.to_string(),
                namespace: namespace.to_string(),
                name: input.name.clone(),
            })?;

        let data: BTreeMap<String, String> = secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, String::from_utf8_lossy(&v.0).into_owned()))
            .collect();

        self.renderer
            .render(&spec.template, &data)
            .map_err(|message| GenerationError::TemplateError {
                key: key.to_string(),
                message,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{GeneratedValueSpec, InputSecretRef, ValueSpec};
    use crate::store::InMemoryStore;
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;

    fn template(entries: Vec<(&str, ValueSpec)>) -> SecretTemplate {
        SecretTemplate {
            data: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    fn templated(template: &str, name: &str, namespace: Option<&str>) -> ValueSpec {
        ValueSpec {
            templated: Some(TemplatedValueSpec {
                template: template.to_string(),
                input_secret_ref: Some(InputSecretRef {
                    name: name.to_string(),
                    namespace: namespace.map(str::to_string),
                }),
            }),
            ..Default::default()
        }
    }

    fn input_secret(namespace: &str, name: &str, pairs: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                pairs
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_literal_and_generated_values() {
        let store = InMemoryStore::new();
        let template = template(vec![
            (
                "USERNAME",
                ValueSpec {
                    value: Some("app".to_string()),
                    ..Default::default()
                },
            ),
            (
                "PASSWORD",
                ValueSpec {
                    generated: Some(GeneratedValueSpec {
                        length: 10,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ),
        ]);

        let payload = Generator::new(&store).generate(&template, "platform").await.unwrap();
        assert_eq!(payload["USERNAME"].0, b"app");
        assert_eq!(payload["PASSWORD"].0.len(), 10);
    }

    #[tokio::test]
    async fn test_templated_value_defaults_to_resource_namespace() {
        let store = InMemoryStore::new();
        store.insert_secret(input_secret(
            "platform",
            "postgres-admin",
            &[("username", "admin"), ("password", "hunter2"), ("host", "pg")],
        ));
        let template = template(vec![(
            "DSN",
            templated(
                "postgresql://{{ .Ref.username }}:{{ .Ref.password }}@{{ .Ref.host }}:5432/app",
                "postgres-admin",
                None,
            ),
        )]);

        let payload = Generator::new(&store).generate(&template, "platform").await.unwrap();
        assert_eq!(
            String::from_utf8(payload["DSN"].0.clone()).unwrap(),
            "postgresql://admin:hunter2@pg:5432/app"
        );
    }

    #[tokio::test]
    async fn test_templated_value_explicit_namespace() {
        let store = InMemoryStore::new();
        store.insert_secret(input_secret("shared", "tokens", &[("token", "abc")]));
        let template = template(vec![(
            "TOKEN",
            templated("Bearer {{ Ref.token }}", "tokens", Some("shared")),
        )]);

        let payload = Generator::new(&store).generate(&template, "platform").await.unwrap();
        assert_eq!(payload["TOKEN"].0, b"Bearer abc");
    }

    #[tokio::test]
    async fn test_missing_input_secret() {
        let store = InMemoryStore::new();
        let template = template(vec![("DSN", templated("{{ .Ref.host }}", "absent", None))]);

        let err = Generator::new(&store)
            .generate(&template, "platform")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InputSecretNotFound { ref key, .. } if key == "DSN"));
        assert_eq!(err.reason(), "InputSecretNotFound");
    }

    #[tokio::test]
    async fn test_missing_input_secret_ref() {
        let store = InMemoryStore::new();
        let template = template(vec![(
            "DSN",
            ValueSpec {
                templated: Some(TemplatedValueSpec {
                    template: "{{ Ref.host }}".to_string(),
                    input_secret_ref: None,
                }),
                ..Default::default()
            },
        )]);

        let err = Generator::new(&store)
            .generate(&template, "platform")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingInputSecretRef { .. }));
        assert_eq!(err.reason(), "GenerationFailed");
    }

    #[tokio::test]
    async fn test_template_error_names_key() {
        let store = InMemoryStore::new();
        store.insert_secret(input_secret("platform", "in", &[("a", "b")]));
        let template = template(vec![("BROKEN", templated("{{ Ref.a ", "in", None))]);

        let err = Generator::new(&store)
            .generate(&template, "platform")
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "TemplateError");
        assert!(err.to_string().contains("BROKEN"));
    }

    #[tokio::test]
    async fn test_generated_values_differ_between_cycles() {
        let store = InMemoryStore::new();
        let template = template(vec![(
            "PASSWORD",
            ValueSpec {
                generated: Some(GeneratedValueSpec {
                    length: 24,
                    max_digits: 4,
                    max_symbols: 4,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )]);

        let generator = Generator::new(&store);
        let first = generator.generate(&template, "platform").await.unwrap();
        let second = generator.generate(&template, "platform").await.unwrap();
        assert_ne!(first["PASSWORD"], second["PASSWORD"]);
    }
}
