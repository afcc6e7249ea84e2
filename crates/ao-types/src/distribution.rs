//! Parameter distributions and sampled values.

use serde::{Deserialize, Serialize};

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Categorical choices. A constant is a single choice.
    Categorical { choices: Vec<serde_json::Value> },
    /// Integer range [low, high] inclusive.
    IntUniform { low: i64, high: i64 },
    /// Continuous uniform range [low, high].
    Uniform { low: f64, high: f64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
}

impl Distribution {
    /// A categorical distribution holding exactly one value.
    pub fn constant(value: serde_json::Value) -> Self {
        Self::Categorical {
            choices: vec![value],
        }
    }
}

/// A concrete parameter value produced by a sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParameterValue {
    /// String handed to the template as an external variable. JSON strings
    /// are passed unquoted; other JSON values are compact-encoded.
    pub fn to_ext_var(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Json(v) => ext_var_text(v),
        }
    }
}

/// External-variable form of a JSON value: strings unquoted, everything
/// else as compact JSON text.
pub fn ext_var_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
