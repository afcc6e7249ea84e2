//! The objective handed to the optimization engine.

use ao_optimizer::TrialHandle;
use ao_types::{AoResult, ObjectiveSpec};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::resolver::resolve_objective;
use crate::runner::{ScopedWorkDir, TrainingRequest, TrainingRunner};
use crate::space::SearchSpace;
use crate::template::{self, ExtVars};

/// Samples a trial, renders its configuration and trains it.
pub struct Objective<R> {
    space: SearchSpace,
    base_config: PathBuf,
    spec: ObjectiveSpec,
    runner: R,
}

impl<R: TrainingRunner> Objective<R> {
    /// Translate the search space, resolve the target metric and bind the
    /// runner. Fails before any trial on configuration problems.
    pub fn build(base_config: &Path, search_space: &Path, runner: R) -> AoResult<Self> {
        let space = SearchSpace::from_file(search_space)?;
        let spec = resolve_objective(base_config, &space.low_values)?;
        Ok(Self::new(space, base_config.to_path_buf(), spec, runner))
    }

    pub fn new(space: SearchSpace, base_config: PathBuf, spec: ObjectiveSpec, runner: R) -> Self {
        Self {
            space,
            base_config,
            spec,
            runner,
        }
    }

    pub fn spec(&self) -> &ObjectiveSpec {
        &self.spec
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Evaluate one trial. Runner errors propagate unchanged.
    pub fn evaluate(&self, trial: &mut dyn TrialHandle) -> AoResult<f64> {
        for parameter in &self.space.parameters {
            trial.suggest(&parameter.name, &parameter.distribution)?;
        }
        let params = trial.params().clone();
        println!("{}", serde_json::to_string(&params)?);
        info!("Trial {} parameters: {:?}", trial.number(), params);

        let ext_vars: ExtVars = params
            .iter()
            .map(|(name, value)| (name.clone(), value.to_ext_var()))
            .collect();
        let config = template::render_file(&self.base_config, &ext_vars)?;
        debug!("Trial {} configuration: {}", trial.number(), config);

        let work_dir = ScopedWorkDir::acquire(trial.number())?;
        self.runner.run(&TrainingRequest {
            trial_number: trial.number(),
            config: &config,
            params: &params,
            work_dir: work_dir.path(),
            metric: &self.spec.metric_name,
        })
    }
}
