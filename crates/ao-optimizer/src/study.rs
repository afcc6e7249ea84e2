//! Study: sequential optimization run management.

use ao_types::{AoError, AoResult, Direction, StudyError};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::sampler::{Sampler, SamplerKind};
use crate::storage::{JsonFileStorage, StudyRecord};
use crate::trial::{FrozenTrial, Trial, TrialHandle, TrialState};

/// Objective signature accepted by the engine.
pub type ObjectiveFn<'a> = dyn FnMut(&mut dyn TrialHandle) -> AoResult<f64> + 'a;

/// The optimization engine as seen by callers that only drive it.
pub trait OptimizerEngine {
    fn direction(&self) -> Direction;

    /// Run trials until `n_trials` have been evaluated or `timeout` has
    /// elapsed, whichever comes first. Either bound may be absent.
    fn optimize(
        &mut self,
        objective: &mut ObjectiveFn<'_>,
        n_trials: Option<usize>,
        timeout: Option<Duration>,
    ) -> AoResult<()>;

    fn best_trial(&self) -> AoResult<&FrozenTrial>;
}

/// Top-level configuration for a study.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyConfig {
    pub name: Option<String>,
    pub direction: Direction,
    pub sampler: SamplerKind,
    pub seed: Option<u64>,

    /// Exploration probability for the perturbation sampler.
    pub exploration_weight: f64,

    /// Storage URL; `None` keeps the study in memory.
    pub storage: Option<String>,

    /// Record failing trials and keep going instead of aborting.
    pub catch_failures: bool,
}

impl StudyConfig {
    pub fn new(direction: Direction) -> Self {
        Self {
            name: None,
            direction,
            sampler: SamplerKind::Random,
            seed: None,
            exploration_weight: 0.3,
            storage: None,
            catch_failures: false,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerKind, seed: Option<u64>) -> Self {
        self.sampler = sampler;
        self.seed = seed;
        self
    }

    pub fn with_exploration_weight(mut self, weight: f64) -> Self {
        self.exploration_weight = weight;
        self
    }

    pub fn with_storage(mut self, storage: Option<String>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_catch_failures(mut self, catch: bool) -> Self {
        self.catch_failures = catch;
        self
    }
}

pub struct Study {
    name: String,
    direction: Direction,
    created_at: DateTime<Utc>,
    trials: Vec<FrozenTrial>,
    sampler: Box<dyn Sampler>,
    storage: Option<JsonFileStorage>,
    catch_failures: bool,
}

impl std::fmt::Debug for Study {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Study")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("trials", &self.trials.len())
            .field("sampler", &self.sampler.name())
            .field("storage", &self.storage)
            .finish()
    }
}

impl Study {
    /// Create a study, resuming a stored one with the same name if present.
    pub fn create(config: StudyConfig) -> AoResult<Self> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("no-name-{}", Uuid::new_v4()));
        let storage = config
            .storage
            .as_deref()
            .map(JsonFileStorage::open)
            .transpose()?;

        let mut created_at = Utc::now();
        let mut trials = Vec::new();
        if let Some(storage) = &storage {
            if let Some(record) = storage.load(&name)? {
                if record.direction != config.direction {
                    return Err(StudyError::DirectionMismatch {
                        study_name: name,
                        stored: record.direction.to_string(),
                        requested: config.direction.to_string(),
                    }
                    .into());
                }
                info!(
                    "Using an existing study with name '{}' ({} trials) from {}",
                    name,
                    record.trials.len(),
                    storage.path().display()
                );
                created_at = record.created_at;
                trials = record
                    .trials
                    .into_iter()
                    .filter(|t| t.state != TrialState::Running)
                    .collect();
            }
        }

        let sampler = config.sampler.build(config.seed, config.exploration_weight);
        info!(
            "A new study created with name: {} (direction={}, sampler={})",
            name,
            config.direction,
            sampler.name()
        );

        let study = Self {
            name,
            direction: config.direction,
            created_at,
            trials,
            sampler,
            storage,
            catch_failures: config.catch_failures,
        };
        study.persist()?;
        Ok(study)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trials(&self) -> &[FrozenTrial] {
        &self.trials
    }

    fn persist(&self) -> AoResult<()> {
        match &self.storage {
            Some(storage) => storage.save(&StudyRecord {
                study_name: self.name.clone(),
                direction: self.direction,
                created_at: self.created_at,
                trials: self.trials.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Evaluate one trial and record its outcome. Returns the objective's
    /// error when the run should abort.
    fn run_trial(&mut self, objective: &mut ObjectiveFn<'_>) -> AoResult<()> {
        let number = self.trials.len();
        self.trials.push(FrozenTrial::running(number));
        self.persist()?;

        let history = &self.trials[..number];
        let mut trial = Trial::new(number, self.direction, history, &mut *self.sampler);
        let outcome = objective(&mut trial);
        let params = trial.into_params();

        let record = &mut self.trials[number];
        record.params = params;
        let result = match outcome {
            Ok(value) if value.is_nan() => {
                record.fail("objective returned NaN".to_string());
                warn!("Trial {} failed because the objective value is NaN", number);
                Ok(())
            }
            Ok(value) => {
                record.complete(value);
                Ok(())
            }
            Err(err) => {
                record.fail(err.to_string());
                warn!("Trial {} failed: {}", number, err);
                if self.catch_failures {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        };
        self.persist()?;

        if let Some(value) = self.trials[number].value {
            let params = serde_json::to_string(&self.trials[number].params)?;
            match self.best_trial() {
                Ok(best) => info!(
                    "Trial {} finished with value: {} and parameters: {}. Best is trial {} with value: {}.",
                    number,
                    value,
                    params,
                    best.number,
                    best.value.unwrap_or(value)
                ),
                Err(_) => info!("Trial {} finished with value: {}", number, value),
            }
        }
        result
    }
}

impl OptimizerEngine for Study {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn optimize(
        &mut self,
        objective: &mut ObjectiveFn<'_>,
        n_trials: Option<usize>,
        timeout: Option<Duration>,
    ) -> AoResult<()> {
        let started = Instant::now();
        let mut executed = 0usize;

        loop {
            if n_trials.is_some_and(|n| executed >= n) {
                break;
            }
            self.run_trial(objective)?;
            executed += 1;

            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    info!(
                        "Timeout of {}s reached after {} trials",
                        limit.as_secs(),
                        executed
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    fn best_trial(&self) -> AoResult<&FrozenTrial> {
        let mut best: Option<(&FrozenTrial, f64)> = None;
        for trial in &self.trials {
            let value = match (trial.state, trial.value) {
                (TrialState::Complete, Some(value)) => value,
                _ => continue,
            };
            if best.map_or(true, |(_, incumbent)| self.direction.improves(value, incumbent)) {
                best = Some((trial, value));
            }
        }
        best.map(|(trial, _)| trial)
            .ok_or(AoError::Study(StudyError::NoCompletedTrials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_types::{Distribution, ParameterValue, TrainingError};
    use tempfile::tempdir;

    fn lr() -> Distribution {
        Distribution::Uniform { low: 0.0, high: 1.0 }
    }

    fn config(direction: Direction) -> StudyConfig {
        StudyConfig::new(direction).with_sampler(SamplerKind::Random, Some(17))
    }

    #[test]
    fn runs_exactly_n_trials() {
        let mut study = Study::create(config(Direction::Minimize)).unwrap();
        let mut calls = 0;
        study
            .optimize(
                &mut |trial| {
                    calls += 1;
                    match trial.suggest("lr", &lr())? {
                        ParameterValue::Float(v) => Ok(v),
                        other => Err(TrainingError::MetricNotReported {
                            metric: format!("{other:?}"),
                        }
                        .into()),
                    }
                },
                Some(5),
                None,
            )
            .unwrap();

        assert_eq!(calls, 5);
        assert_eq!(study.trials().len(), 5);
        assert!(study.trials().iter().all(|t| t.state == TrialState::Complete));
        assert!(study.name().starts_with("no-name-"));
    }

    #[test]
    fn best_trial_honours_direction() {
        let values = [0.3, 0.9, 0.1, 0.5];

        let mut study = Study::create(config(Direction::Maximize)).unwrap();
        let mut iter = values.iter();
        study
            .optimize(&mut |_| Ok(*iter.next().unwrap()), Some(4), None)
            .unwrap();
        assert_eq!(study.best_trial().unwrap().number, 1);

        let mut study = Study::create(config(Direction::Minimize)).unwrap();
        let mut iter = values.iter();
        study
            .optimize(&mut |_| Ok(*iter.next().unwrap()), Some(4), None)
            .unwrap();
        assert_eq!(study.best_trial().unwrap().value, Some(0.1));
    }

    #[test]
    fn failing_objective_aborts_and_is_recorded() {
        let mut study = Study::create(config(Direction::Minimize)).unwrap();
        let err = study
            .optimize(
                &mut |trial| {
                    trial.suggest("lr", &lr())?;
                    Err(TrainingError::ProcessFailed {
                        status: "exit status: 2".into(),
                    }
                    .into())
                },
                Some(3),
                None,
            )
            .unwrap_err();

        assert!(matches!(err, AoError::Training(_)));
        assert_eq!(study.trials().len(), 1);
        let failed = &study.trials()[0];
        assert_eq!(failed.state, TrialState::Failed);
        assert!(failed.error.as_deref().unwrap().contains("exit status: 2"));
        assert!(failed.params.contains_key("lr"));
        assert!(matches!(
            study.best_trial(),
            Err(AoError::Study(StudyError::NoCompletedTrials))
        ));
    }

    #[test]
    fn caught_failures_keep_running() {
        let mut study =
            Study::create(config(Direction::Minimize).with_catch_failures(true)).unwrap();
        let mut calls = 0;
        study
            .optimize(
                &mut |_| {
                    calls += 1;
                    if calls % 2 == 0 {
                        Err(TrainingError::ProcessFailed {
                            status: "exit status: 1".into(),
                        }
                        .into())
                    } else {
                        Ok(calls as f64)
                    }
                },
                Some(4),
                None,
            )
            .unwrap();

        assert_eq!(study.trials().len(), 4);
        let failed = study
            .trials()
            .iter()
            .filter(|t| t.state == TrialState::Failed)
            .count();
        assert_eq!(failed, 2);
        assert_eq!(study.best_trial().unwrap().value, Some(1.0));
    }

    #[test]
    fn nan_marks_trial_failed_without_abort() {
        let mut study = Study::create(config(Direction::Minimize)).unwrap();
        study
            .optimize(&mut |_| Ok(f64::NAN), Some(2), None)
            .unwrap();
        assert!(study.trials().iter().all(|t| t.state == TrialState::Failed));
    }

    #[test]
    fn timeout_stops_between_trials() {
        let mut study = Study::create(config(Direction::Minimize)).unwrap();
        study
            .optimize(&mut |_| Ok(1.0), None, Some(Duration::ZERO))
            .unwrap();
        assert_eq!(study.trials().len(), 1);
    }

    #[test]
    fn stored_study_resumes_by_name() {
        let dir = tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("studies.json").display());
        let named = || {
            config(Direction::Maximize)
                .with_name(Some("bert-tuning".into()))
                .with_storage(Some(url.clone()))
        };

        let mut study = Study::create(named()).unwrap();
        study
            .optimize(
                &mut |trial| {
                    trial.suggest("layers", &Distribution::IntUniform { low: 1, high: 4 })?;
                    Ok(0.7)
                },
                Some(2),
                None,
            )
            .unwrap();

        let mut resumed = Study::create(named()).unwrap();
        assert_eq!(resumed.trials().len(), 2);
        resumed.optimize(&mut |_| Ok(0.8), Some(1), None).unwrap();
        assert_eq!(resumed.trials().len(), 3);
        assert_eq!(resumed.trials()[2].number, 2);
        assert_eq!(resumed.best_trial().unwrap().value, Some(0.8));
        assert!(matches!(
            resumed.trials()[0].params.get("layers"),
            Some(ParameterValue::Int(1..=4))
        ));

        let mismatch = Study::create(
            StudyConfig::new(Direction::Minimize)
                .with_name(Some("bert-tuning".into()))
                .with_storage(Some(url.clone())),
        )
        .unwrap_err();
        assert!(matches!(
            mismatch,
            AoError::Study(StudyError::DirectionMismatch { .. })
        ));
    }
}
