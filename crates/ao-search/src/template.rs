//! Evaluation of AllenNLP Jsonnet configuration templates.
//!
//! Templates are evaluated by `jrsonnet` with the standard library loaded,
//! imports resolved relative to the template, and every binding passed as
//! a string external variable (`std.extVar`). The manifested document is
//! handed back as JSON.

use ao_types::{AoResult, TemplateError};
use jrsonnet_evaluator::{EvaluationState, FileImportResolver};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

/// External variables passed to `std.extVar`.
pub type ExtVars = BTreeMap<String, String>;

/// Evaluate the template at `path` with `ext_vars`.
pub fn render_file(path: &Path, ext_vars: &ExtVars) -> AoResult<Value> {
    let source = std::fs::read_to_string(path)?;
    Ok(evaluate(path, &source, ext_vars)?)
}

/// Evaluate template `source` with `ext_vars`.
pub fn render(source: &str, ext_vars: &ExtVars) -> Result<Value, TemplateError> {
    evaluate(Path::new("<template>"), source, ext_vars)
}

fn evaluate(origin: &Path, source: &str, ext_vars: &ExtVars) -> Result<Value, TemplateError> {
    let state = EvaluationState::default();
    state.with_stdlib();
    state.set_import_resolver(Box::new(FileImportResolver {
        library_paths: Vec::new(),
    }));
    for (name, value) in ext_vars {
        state.add_ext_str(name.as_str().into(), value.as_str().into());
    }

    let manifest = state
        .evaluate_snippet_raw(Rc::<Path>::from(origin), source.into())
        .and_then(|value| state.manifest(value))
        .map_err(|err| TemplateError::Evaluation {
            origin: origin.display().to_string(),
            message: state.stringify_err(&err),
        })?;

    serde_json::from_str(&manifest).map_err(|err| TemplateError::Output {
        origin: origin.display().to_string(),
        message: err.to_string(),
    })
}
