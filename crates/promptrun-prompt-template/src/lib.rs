//! Variable interpolation for prompt templates.
//!
//! Templates reference variables as `${name}`. Every placeholder must resolve:
//! an absent variable is an error, never an empty string. Declared variable
//! specs are checked before interpolation so that a bad request fails before
//! any LLM call is made.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use promptrun_utils::error::VariableError;
pub use promptrun_utils::types::{VariableKind, VariableMap};

// Matches any `${...}`; malformed names are rejected in `interpolate`.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^{}]*)\}").expect("placeholder regex is valid"));

fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Primitive type a declared variable must have at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// Any non-null value
    #[default]
    Any,
}

impl VariableType {
    /// Whether `value` has this type. `Integer` values also satisfy `Number`.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => !value.is_null(),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }
}

/// Declaration of one template variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl VariableSpec {
    #[must_use]
    pub fn required(var_type: VariableType) -> Self {
        Self {
            var_type,
            required: true,
            default: None,
        }
    }

    #[must_use]
    pub fn optional(var_type: VariableType) -> Self {
        Self {
            var_type,
            required: false,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Variable declarations keyed by name.
pub type VariableSpecMap = BTreeMap<String, VariableSpec>;

/// Substitute every `${name}` in `template` from `vars`.
///
/// String values are inserted verbatim; any other value is inserted as its
/// JSON text. Substitution is a single pass, so values containing `${...}`
/// are not expanded again.
///
/// # Errors
///
/// Returns [`VariableError::MissingVariable`] for the first placeholder whose
/// name is not a key of `vars`.
pub fn interpolate(template: &str, vars: &VariableMap) -> Result<String, VariableError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str().trim();
        let value = vars
            .get(name)
            .filter(|_| is_variable_name(name))
            .ok_or_else(|| VariableError::MissingVariable {
                name: name.to_string(),
            })?;

        out.push_str(&template[last..whole.start()]);
        match value {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Names of all placeholders in `template`, in order of appearance.
#[must_use]
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .collect()
}

/// Fill variables absent from `vars` with their declared default.
///
/// Present values, including explicit nulls, are left untouched.
pub fn apply_defaults(vars: &mut VariableMap, spec: &VariableSpecMap) {
    for (name, decl) in spec {
        if let Some(default) = &decl.default
            && !vars.contains_key(name)
        {
            vars.insert(name.clone(), default.clone());
        }
    }
}

/// Check `vars` against the declared `spec`.
///
/// Required variables must be present and non-null. Every supplied, non-null
/// declared variable must match its declared type. An empty spec accepts
/// anything.
///
/// # Errors
///
/// Returns [`VariableError::MissingRequiredVariable`] or
/// [`VariableError::TypeMismatch`] for the first offending variable.
pub fn validate_variables(
    vars: &VariableMap,
    spec: &VariableSpecMap,
    kind: VariableKind,
) -> Result<(), VariableError> {
    for (name, decl) in spec {
        let value = vars.get(name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if decl.required {
                return Err(VariableError::MissingRequiredVariable {
                    name: name.clone(),
                    kind,
                });
            }
            continue;
        };

        if !decl.var_type.matches(value) {
            return Err(VariableError::TypeMismatch {
                name: name.clone(),
                kind,
                expected: decl.var_type.as_str().to_string(),
                actual: json_type_name(value).to_string(),
            });
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
