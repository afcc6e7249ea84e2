//! The `search` command: translate, resolve, optimize, report.

use ao_optimizer::{OptimizerEngine, Params, SamplerKind, Study, StudyConfig, TrialHandle};
use ao_search::{AllenNlpRunner, AllenNlpRunnerConfig, Objective};
use ao_types::{config_error, AoResult};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Path to configuration file of AllenNLP
    #[arg(long)]
    pub base_config: PathBuf,

    /// Path to search space configuration
    #[arg(long)]
    pub search_space: PathBuf,

    /// Name of the experiment. Alias for the study name
    #[arg(long)]
    pub experiment_name: Option<String>,

    /// A study name
    #[arg(long)]
    pub study_name: Option<String>,

    /// Study storage URL (file:<path> or a path to a JSON file)
    #[arg(long)]
    pub storage: Option<String>,

    /// Alias for the number of trials
    #[arg(long)]
    pub num_samples: Option<usize>,

    /// The number of trials
    #[arg(long)]
    pub n_trials: Option<usize>,

    /// Seconds to timeout
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Sampler: random or perturbation
    #[arg(long, default_value = "random")]
    pub sampler: SamplerKind,

    /// Seed for the sampler
    #[arg(long)]
    pub seed: Option<u64>,

    /// Probability of exploring instead of perturbing the best trial
    #[arg(long, default_value_t = 0.3)]
    pub exploration_weight: f64,

    /// Record failed trials and continue instead of aborting
    #[arg(long)]
    pub catch_failures: bool,

    /// Trainer program (defaults to $ALLENOPT_ALLENNLP_BIN or `allennlp`)
    #[arg(long)]
    pub allennlp_bin: Option<PathBuf>,

    /// Argument placed before `train`, e.g. `-m allennlp` for a python binary
    #[arg(long = "allennlp-arg", allow_hyphen_values = true)]
    pub allennlp_args: Vec<String>,

    /// Package to load in the trainer (repeatable)
    #[arg(long)]
    pub include_package: Vec<String>,
}

impl SearchArgs {
    pub fn study_name(&self) -> Option<String> {
        if let (Some(study), Some(experiment)) = (&self.study_name, &self.experiment_name) {
            if study != experiment {
                warn!("--study-name {study:?} overrides --experiment-name {experiment:?}");
            }
        }
        self.study_name.clone().or_else(|| self.experiment_name.clone())
    }

    pub fn n_trials(&self) -> Option<usize> {
        if let (Some(n), Some(samples)) = (self.n_trials, self.num_samples) {
            if n != samples {
                warn!("--n-trials {n} overrides --num-samples {samples}");
            }
        }
        self.n_trials.or(self.num_samples)
    }

    fn runner_config(&self) -> AllenNlpRunnerConfig {
        let mut config = AllenNlpRunnerConfig::default()
            .with_base_args(self.allennlp_args.clone())
            .with_include_packages(self.include_package.clone());
        if let Some(program) = &self.allennlp_bin {
            config = config.with_program(program.clone());
        }
        config
    }
}

/// Result of a finished search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub study_name: String,
    pub best_value: f64,
    pub best_params: Params,
    pub trials: usize,
}

impl SearchOutcome {
    /// Text printed to stdout on success.
    pub fn report(&self) -> AoResult<String> {
        Ok(format!(
            "Best score: {}\n{}",
            self.best_value,
            serde_json::to_string_pretty(&self.best_params)?
        ))
    }
}

pub fn run(args: &SearchArgs) -> AoResult<SearchOutcome> {
    if !(0.0..=1.0).contains(&args.exploration_weight) {
        return Err(config_error!(
            "--exploration-weight must be within [0, 1], got {}",
            args.exploration_weight
        ));
    }

    let runner = AllenNlpRunner::new(args.runner_config());
    let objective = Objective::build(&args.base_config, &args.search_space, runner)?;

    let config = StudyConfig::new(objective.spec().direction)
        .with_name(args.study_name())
        .with_sampler(args.sampler, args.seed)
        .with_exploration_weight(args.exploration_weight)
        .with_storage(args.storage.clone())
        .with_catch_failures(args.catch_failures);
    let mut study = Study::create(config)?;

    let n_trials = args.n_trials();
    let timeout = args.timeout.map(Duration::from_secs);
    info!(
        "Starting study {} to {} {} (n_trials={:?}, timeout={:?})",
        study.name(),
        study.direction(),
        objective.spec().metric_name,
        n_trials,
        timeout
    );
    study.optimize(
        &mut |trial: &mut dyn TrialHandle| objective.evaluate(trial),
        n_trials,
        timeout,
    )?;

    let best = study.best_trial()?;
    Ok(SearchOutcome {
        study_name: study.name().to_string(),
        best_value: best.value.unwrap_or(f64::NAN),
        best_params: best.params.clone(),
        trials: study.trials().len(),
    })
}
