//! # ao-search
//!
//! Bridges a search-space description and an AllenNLP configuration
//! template to the study engine: translates the search space into
//! distributions, works out which metric to optimize and in which
//! direction, and builds the per-trial objective that renders a
//! configuration and trains it in a scoped working directory.

pub mod objective;
pub mod resolver;
pub mod runner;
pub mod space;
pub mod template;

pub use objective::Objective;
pub use resolver::{objective_from_config, parse_validation_metric, resolve_objective};
pub use runner::{
    AllenNlpRunner, AllenNlpRunnerConfig, ScopedWorkDir, TrainingRequest, TrainingRunner,
};
pub use space::{ParameterSpec, SearchSpace};
pub use template::{render, render_file, ExtVars};
