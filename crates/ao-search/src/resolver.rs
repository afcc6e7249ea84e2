//! Objective metric and direction from the base configuration.

use ao_types::{config_error, AoResult, Direction, ObjectiveSpec};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::template::{self, ExtVars};

/// AllenNLP's trainer default when `validation_metric` is absent.
pub const DEFAULT_VALIDATION_METRIC: &str = "-loss";

/// Prefix AllenNLP gives the best validation value in `metrics.json`.
pub const BEST_VALIDATION_PREFIX: &str = "best_validation_";

/// Render the template at `base_config` with `low_values` and derive the
/// objective from its trainer section.
pub fn resolve_objective(base_config: &Path, low_values: &ExtVars) -> AoResult<ObjectiveSpec> {
    let config = template::render_file(base_config, low_values)?;
    let spec = objective_from_config(&config)?;
    info!(
        "Optimizing {} ({}) as configured by {}",
        spec.metric_name,
        spec.direction,
        base_config.display()
    );
    Ok(spec)
}

pub fn objective_from_config(config: &Value) -> AoResult<ObjectiveSpec> {
    let trainer = config
        .get("trainer")
        .ok_or_else(|| config_error!("base configuration has no \"trainer\" section"))?
        .as_object()
        .ok_or_else(|| config_error!("\"trainer\" must be an object"))?;

    let metric = match trainer.get("validation_metric") {
        None => DEFAULT_VALIDATION_METRIC,
        Some(Value::String(metric)) => metric.as_str(),
        Some(other) => {
            return Err(config_error!(
                "trainer.validation_metric must be a string like \"+accuracy\", got {other}"
            ))
        }
    };
    parse_validation_metric(metric)
}

/// Split `+name` / `-name` into the best-validation metric and direction.
pub fn parse_validation_metric(metric: &str) -> AoResult<ObjectiveSpec> {
    let mut chars = metric.chars();
    let direction = match chars.next() {
        Some('+') => Direction::Maximize,
        Some('-') => Direction::Minimize,
        _ => {
            return Err(config_error!(
                "trainer.validation_metric {metric:?} must start with '+' or '-'"
            ))
        }
    };
    let name = chars.as_str();
    if name.is_empty() {
        return Err(config_error!(
            "trainer.validation_metric {metric:?} has no metric name"
        ));
    }
    Ok(ObjectiveSpec {
        metric_name: format!("{BEST_VALIDATION_PREFIX}{name}"),
        direction,
    })
}
