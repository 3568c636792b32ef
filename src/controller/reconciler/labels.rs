//! # Ownership Labels
//!
//! Labels linking a secret copy to the GeneratedSecret that produced it, and
//! construction of the desired copy.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::constants::{LABEL_OWNER_NAME, LABEL_OWNER_NAMESPACE, LABEL_OWNER_REF};
use crate::crd::{GeneratedSecret, GeneratedSecretRef};
use crate::generation::Payload;

/// Ownership triple: resource name, resource namespace, resource UID
#[must_use]
pub fn ownership_labels(resource: &GeneratedSecret) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_OWNER_NAME.to_string(), resource.name_any()),
        (
            LABEL_OWNER_NAMESPACE.to_string(),
            resource.namespace().unwrap_or_default(),
        ),
        (
            LABEL_OWNER_REF.to_string(),
            resource.uid().unwrap_or_default(),
        ),
    ])
}

/// Declared labels overlaid with the ownership labels
#[must_use]
pub fn expected_labels(resource: &GeneratedSecret) -> BTreeMap<String, String> {
    let mut labels = resource.spec.metadata.labels.clone();
    labels.extend(ownership_labels(resource));
    labels
}

/// Whether `secret` carries the ownership triple of `resource`
#[must_use]
pub fn is_owned_by(resource: &GeneratedSecret, secret: &Secret) -> bool {
    let labels = secret.labels();
    ownership_labels(resource)
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Identity of a live copy, as recorded in status
#[must_use]
pub fn secret_ref(secret: &Secret) -> GeneratedSecretRef {
    GeneratedSecretRef {
        name: secret.name_any(),
        namespace: secret.namespace().unwrap_or_default(),
        r#type: secret.type_.clone().unwrap_or_default(),
        resource_version: secret.resource_version().unwrap_or_default(),
        uid: secret.uid().unwrap_or_default(),
    }
}

/// Desired copy of `resource` in `namespace` carrying `payload`
#[must_use]
pub fn build_secret(resource: &GeneratedSecret, namespace: &str, payload: &Payload) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(resource.secret_name()),
            namespace: Some(namespace.to_string()),
            labels: Some(expected_labels(resource)),
            annotations: Some(resource.spec.metadata.annotations.clone()),
            ..Default::default()
        },
        data: Some(payload.clone()),
        type_: Some(resource.secret_kind()),
        ..Default::default()
    }
}

/// Whether the live copy has the labels and annotations `resource` declares
#[must_use]
pub fn metadata_matches(resource: &GeneratedSecret, secret: &Secret) -> bool {
    secret.labels() == &expected_labels(resource)
        && secret.annotations() == &resource.spec.metadata.annotations
}

/// Whether the live copy matches the desired copy in payload, metadata and type
#[must_use]
pub fn matches_desired(resource: &GeneratedSecret, secret: &Secret, payload: &Payload) -> bool {
    metadata_matches(resource, secret)
        && secret.data.as_ref() == Some(payload)
        && secret.type_.as_deref() == Some(resource.secret_kind().as_str())
}
