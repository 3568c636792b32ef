//! # Secret Template
//!
//! Per-key value specifications of a `GeneratedSecret`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Template of the generated payload
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    /// Payload key -> how its value is produced
    #[serde(default)]
    pub data: BTreeMap<String, ValueSpec>,
}

/// How a single payload value is produced
///
/// Exactly one field must be set. `static` is the deprecated spelling of `value`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValueSpec {
    /// Literal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Deprecated literal value
    #[serde(default, rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_value: Option<StaticValueSpec>,
    /// Value rendered from the fields of another secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templated: Option<TemplatedValueSpec>,
    /// Randomly generated password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<GeneratedValueSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaticValueSpec {
    #[serde(default)]
    pub value: String,
}

/// Templated value
///
/// Fields of the referenced secret are addressed as `{{ Ref.<key> }}`
/// (`{{ .Ref.<key> }}` is accepted too).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplatedValueSpec {
    #[serde(default)]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_secret_ref: Option<InputSecretRef>,
}

/// Reference to the secret a templated value reads from
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputSecretRef {
    pub name: String,
    /// Defaults to the namespace of the GeneratedSecret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Password generation parameters
///
/// When `maxLength` is set, the length is drawn uniformly from `[minLength, maxLength]`.
/// Otherwise the length is `max(length, minLength)`.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedValueSpec {
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub min_length: u32,
    #[serde(default)]
    pub max_length: u32,
    /// Upper bound of the number of symbols
    #[serde(default)]
    pub max_symbols: u32,
    /// Upper bound of the number of digits
    #[serde(default)]
    pub max_digits: u32,
    /// Lowercase letters only
    #[serde(default)]
    pub no_upper: bool,
    /// No character repeats the one before it
    #[serde(default)]
    pub no_repeat: bool,
    /// Legacy spelling of `noUpper`
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_upper_case_values: bool,
    /// Legacy spelling of `noRepeat`
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_repeated_values: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if signature")]
fn is_false(value: &bool) -> bool {
    !*value
}

impl GeneratedValueSpec {
    /// Lowercase letters only, under either spelling
    #[must_use]
    pub fn forbids_upper(&self) -> bool {
        self.no_upper || self.no_upper_case_values
    }

    /// No adjacent repeats, under either spelling
    #[must_use]
    pub fn forbids_repeats(&self) -> bool {
        self.no_repeat || self.no_repeated_values
    }
}

/// The populated variant of a [`ValueSpec`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueSource<'a> {
    Literal(&'a str),
    Templated(&'a TemplatedValueSpec),
    Generated(&'a GeneratedValueSpec),
}

impl ValueSpec {
    /// Number of populated variants
    #[must_use]
    pub fn populated_variants(&self) -> usize {
        usize::from(self.value.is_some())
            + usize::from(self.static_value.is_some())
            + usize::from(self.templated.is_some())
            + usize::from(self.generated.is_some())
    }

    /// The single populated variant, `None` when zero or several are set
    #[must_use]
    pub fn source(&self) -> Option<ValueSource<'_>> {
        if self.populated_variants() != 1 {
            return None;
        }
        if let Some(value) = &self.value {
            Some(ValueSource::Literal(value))
        } else if let Some(static_value) = &self.static_value {
            Some(ValueSource::Literal(&static_value.value))
        } else if let Some(templated) = &self.templated {
            Some(ValueSource::Templated(templated))
        } else {
            self.generated.as_ref().map(ValueSource::Generated)
        }
    }
}
