//! # ao-optimizer
//!
//! Sequential hyperparameter study engine for allenopt.
//!
//! Provides define-by-run trials, random and perturbation samplers, trial
//! bookkeeping and an optional JSON-file storage that lets a named study be
//! resumed.

mod sampler;
mod storage;
mod study;
mod trial;

pub use sampler::{PerturbationSampler, RandomSampler, Sampler, SamplerKind, SamplingContext};
pub use storage::{parse_storage_url, JsonFileStorage, StudyRecord};
pub use study::{ObjectiveFn, OptimizerEngine, Study, StudyConfig};
pub use trial::{FrozenTrial, Params, Trial, TrialHandle, TrialState};
