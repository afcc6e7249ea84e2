//! Training runs: the runner seam, the AllenNLP subprocess runner and
//! per-trial working directories.

use ao_optimizer::Params;
use ao_types::{AoResult, TrainingError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Environment variable overriding the trainer program.
pub const ALLENNLP_BIN_ENV: &str = "ALLENOPT_ALLENNLP_BIN";

/// Everything a runner needs to train one trial.
#[derive(Debug, Clone, Copy)]
pub struct TrainingRequest<'a> {
    pub trial_number: usize,
    /// Fully rendered training configuration.
    pub config: &'a Value,
    pub params: &'a Params,
    /// Scratch directory owned by this trial; removed after the run.
    pub work_dir: &'a Path,
    /// Metric to read back, e.g. `best_validation_accuracy`.
    pub metric: &'a str,
}

/// Executes a full training run and reports the target metric.
pub trait TrainingRunner {
    fn run(&self, request: &TrainingRequest<'_>) -> AoResult<f64>;
}

/// Temporary trial directory, removed when dropped. A failed removal is
/// logged rather than silently leaking the directory.
#[derive(Debug)]
pub struct ScopedWorkDir {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScopedWorkDir {
    pub fn acquire(trial_number: usize) -> AoResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("allenopt-trial-{trial_number}-"))
            .tempdir()?;
        debug!("Created working directory {}", dir.path().display());
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedWorkDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => debug!("Removed working directory {}", self.path.display()),
            Err(err) => warn!(
                "Failed to remove working directory {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllenNlpRunnerConfig {
    pub program: PathBuf,
    /// Arguments placed before `train`, e.g. a wrapper script.
    pub base_args: Vec<String>,
    pub include_packages: Vec<String>,
}

impl Default for AllenNlpRunnerConfig {
    fn default() -> Self {
        let program = std::env::var(ALLENNLP_BIN_ENV).unwrap_or_else(|_| "allennlp".to_string());
        Self {
            program: PathBuf::from(program),
            base_args: Vec::new(),
            include_packages: Vec::new(),
        }
    }
}

impl AllenNlpRunnerConfig {
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    pub fn with_include_packages(mut self, packages: Vec<String>) -> Self {
        self.include_packages = packages;
        self
    }
}

/// Runs `allennlp train` in a child process and reads `metrics.json`.
#[derive(Debug, Clone, Default)]
pub struct AllenNlpRunner {
    config: AllenNlpRunnerConfig,
}

impl AllenNlpRunner {
    pub fn new(config: AllenNlpRunnerConfig) -> Self {
        Self { config }
    }

    fn command(&self, config_path: &Path, serialization_dir: &Path, params: &Params) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.base_args)
            .arg("train")
            .arg(config_path)
            .arg("--serialization-dir")
            .arg(serialization_dir);
        for package in &self.config.include_packages {
            command.arg("--include-package").arg(package);
        }
        for (name, value) in params {
            command.env(name, value.to_ext_var());
        }
        // stdout is reserved for search results
        command.stdout(Stdio::from(std::io::stderr()));
        command.stderr(Stdio::inherit());
        command
    }
}

impl TrainingRunner for AllenNlpRunner {
    fn run(&self, request: &TrainingRequest<'_>) -> AoResult<f64> {
        let config_path = request.work_dir.join("config.json");
        std::fs::write(&config_path, serde_json::to_vec_pretty(request.config)?)?;
        let serialization_dir = request.work_dir.join("serialization");

        info!(
            "Trial {}: running {} train into {}",
            request.trial_number,
            self.config.program.display(),
            serialization_dir.display()
        );
        let status = self
            .command(&config_path, &serialization_dir, request.params)
            .status()
            .map_err(|source| TrainingError::Launch {
                program: self.config.program.display().to_string(),
                source,
            })?;
        if !status.success() {
            return Err(TrainingError::ProcessFailed {
                status: status.to_string(),
            }
            .into());
        }

        read_metric(&serialization_dir.join("metrics.json"), request.metric)
    }
}

/// A `metrics.json` entry. Non-numeric entries (durations, peak memory
/// tables) are kept for error reporting only.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MetricValue {
    Number(f64),
    Other(Value),
}

/// Read `metric` from an AllenNLP `metrics.json`.
///
/// The file is written by Python's `json`, which spells non-finite floats
/// as bare `NaN` / `Infinity`; those come back as the matching `f64`.
pub fn read_metric(path: &Path, metric: &str) -> AoResult<f64> {
    if !path.exists() {
        return Err(TrainingError::MetricsMissing {
            path: path.display().to_string(),
        }
        .into());
    }
    let text = std::fs::read_to_string(path)?;
    let mut metrics: BTreeMap<String, MetricValue> =
        json5::from_str(&text).map_err(|err| TrainingError::MalformedMetrics {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
    match metrics.remove(metric) {
        Some(MetricValue::Number(value)) => Ok(value),
        Some(MetricValue::Other(value)) => Err(TrainingError::NonNumericMetric {
            metric: metric.to_string(),
            value: value.to_string(),
        }
        .into()),
        None => Err(TrainingError::MetricNotReported {
            metric: metric.to_string(),
        }
        .into()),
    }
}
