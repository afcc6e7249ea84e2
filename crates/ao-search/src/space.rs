//! Search-space translation: JSON description → typed distributions.

use ao_types::{ext_var_text, AoResult, Distribution, SearchSpaceError};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::template::ExtVars;

const STRATEGY_FIELD: &str = "sampling strategy";

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub distribution: Distribution,
}

/// Translated search space, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterSpec>,
    /// Each parameter's first admissible value as written in the search
    /// space file, used to evaluate the base template before any trial.
    pub low_values: ExtVars,
}

impl SearchSpace {
    pub fn from_file(path: &Path) -> AoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&text)?;
        let space = Self::from_json(&document)?;
        info!(
            "Loaded {} parameters from {}",
            space.parameters.len(),
            path.display()
        );
        Ok(space)
    }

    pub fn from_json(document: &Value) -> Result<Self, SearchSpaceError> {
        let entries = document.as_object().ok_or_else(|| SearchSpaceError::NotAnObject {
            found: json_kind(document).to_string(),
        })?;

        let mut space = Self::default();
        for (name, value) in entries {
            let (distribution, low) = translate(name, value)?;
            space.low_values.insert(name.clone(), ext_var_text(low));
            space.parameters.push(ParameterSpec {
                name: name.clone(),
                distribution,
            });
        }
        Ok(space)
    }
}

/// Translate one entry, returning its distribution and its first
/// admissible value (the literal, the first choice or the low bound).
fn translate<'a>(
    name: &str,
    value: &'a Value,
) -> Result<(Distribution, &'a Value), SearchSpaceError> {
    let Some(entry) = value.as_object() else {
        return Ok((Distribution::constant(value.clone()), value));
    };

    let strategy = entry
        .get(STRATEGY_FIELD)
        .ok_or_else(|| missing(name, STRATEGY_FIELD))?;
    let strategy = strategy.as_str().ok_or_else(|| SearchSpaceError::UnknownStrategy {
        parameter: name.to_string(),
        strategy: strategy.to_string(),
    })?;

    match strategy {
        "choice" => {
            let choices = entry
                .get("choices")
                .ok_or_else(|| missing(name, "choices"))?
                .as_array()
                .ok_or_else(|| invalid(name, "choices must be an array"))?;
            if choices.is_empty() {
                return Err(SearchSpaceError::EmptyChoices {
                    parameter: name.to_string(),
                });
            }
            Ok((
                Distribution::Categorical {
                    choices: choices.clone(),
                },
                &choices[0],
            ))
        }
        "integer" => {
            let (first, last) = bounds(name, entry)?;
            let as_int = |v: &Value| {
                v.as_i64()
                    .ok_or_else(|| invalid(name, &format!("integer bounds required, got {v}")))
            };
            let (low, high) = (as_int(first)?, as_int(last)?);
            ordered(name, low, high)?;
            Ok((Distribution::IntUniform { low, high }, first))
        }
        "uniform" | "loguniform" => {
            let (first, last) = bounds(name, entry)?;
            let as_float = |v: &Value| {
                v.as_f64()
                    .ok_or_else(|| invalid(name, &format!("numeric bounds required, got {v}")))
            };
            let (low, high) = (as_float(first)?, as_float(last)?);
            ordered(name, low, high)?;
            if strategy == "uniform" {
                return Ok((Distribution::Uniform { low, high }, first));
            }
            if low <= 0.0 {
                return Err(invalid(
                    name,
                    &format!("log-uniform bounds must be positive, got low {low}"),
                ));
            }
            Ok((Distribution::LogUniform { low, high }, first))
        }
        other => Err(SearchSpaceError::UnknownStrategy {
            parameter: name.to_string(),
            strategy: other.to_string(),
        }),
    }
}

fn bounds<'a>(
    name: &str,
    entry: &'a serde_json::Map<String, Value>,
) -> Result<(&'a Value, &'a Value), SearchSpaceError> {
    match entry.get("bounds").ok_or_else(|| missing(name, "bounds"))? {
        Value::Array(pair) if pair.len() == 2 => Ok((&pair[0], &pair[1])),
        other => Err(invalid(
            name,
            &format!("bounds must be a [low, high] pair, got {other}"),
        )),
    }
}

fn ordered<T: PartialOrd + std::fmt::Display>(
    name: &str,
    low: T,
    high: T,
) -> Result<(), SearchSpaceError> {
    if low > high {
        return Err(invalid(
            name,
            &format!("low {low} is greater than high {high}"),
        ));
    }
    Ok(())
}

fn missing(name: &str, field: &str) -> SearchSpaceError {
    SearchSpaceError::MissingField {
        parameter: name.to_string(),
        field: field.to_string(),
    }
}

fn invalid(name: &str, message: &str) -> SearchSpaceError {
    SearchSpaceError::InvalidBounds {
        parameter: name.to_string(),
        message: message.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
