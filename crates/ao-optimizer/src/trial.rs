//! Trial records and the handle an objective samples through.

use ao_types::{AoResult, Direction, Distribution, ParameterValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::sampler::{self, Sampler, SamplingContext};

/// Sampled assignment of one trial, keyed by parameter name.
pub type Params = BTreeMap<String, ParameterValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    Running,
    Complete,
    Failed,
}

/// A finished (or in-flight) trial as recorded by the study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenTrial {
    pub id: Uuid,
    pub number: usize,
    pub state: TrialState,
    pub value: Option<f64>,
    pub params: Params,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl FrozenTrial {
    pub fn running(number: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            state: TrialState::Running,
            value: None,
            params: Params::new(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn complete(&mut self, value: f64) {
        self.state = TrialState::Complete;
        self.value = Some(value);
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.state = TrialState::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}

/// What an objective sees of the trial it is evaluating.
pub trait TrialHandle {
    fn number(&self) -> usize;

    /// Draw a value for `name`, recording it against the trial. Asking for
    /// the same name twice returns the recorded value.
    fn suggest(&mut self, name: &str, distribution: &Distribution) -> AoResult<ParameterValue>;

    fn params(&self) -> &Params;
}

/// Live trial handed to the objective by [`crate::Study::optimize`].
pub struct Trial<'a> {
    number: usize,
    direction: Direction,
    history: &'a [FrozenTrial],
    sampler: &'a mut dyn Sampler,
    params: Params,
}

impl<'a> Trial<'a> {
    pub(crate) fn new(
        number: usize,
        direction: Direction,
        history: &'a [FrozenTrial],
        sampler: &'a mut dyn Sampler,
    ) -> Self {
        Self {
            number,
            direction,
            history,
            sampler,
            params: Params::new(),
        }
    }

    pub(crate) fn into_params(self) -> Params {
        self.params
    }
}

impl TrialHandle for Trial<'_> {
    fn number(&self) -> usize {
        self.number
    }

    fn suggest(&mut self, name: &str, distribution: &Distribution) -> AoResult<ParameterValue> {
        if let Some(existing) = self.params.get(name) {
            return Ok(existing.clone());
        }
        sampler::validate(name, distribution)?;

        let context = SamplingContext {
            trial_number: self.number,
            direction: self.direction,
            history: self.history,
        };
        let value = self.sampler.sample(&context, name, distribution);
        self.params.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn params(&self) -> &Params {
        &self.params
    }
}
