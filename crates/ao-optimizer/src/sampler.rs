//! Sampling strategies used by trials to draw parameter values.

use ao_types::{AoResult, Direction, Distribution, ParameterValue, StudyError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::str::FromStr;

use crate::trial::{FrozenTrial, TrialState};

/// What a sampler may look at when drawing a value.
#[derive(Debug, Clone, Copy)]
pub struct SamplingContext<'a> {
    pub trial_number: usize,
    pub direction: Direction,
    /// Finished trials of the study, oldest first.
    pub history: &'a [FrozenTrial],
}

/// Common trait for all samplers.
pub trait Sampler: Send {
    /// Draw one value for `name` from `distribution`.
    fn sample(
        &mut self,
        context: &SamplingContext<'_>,
        name: &str,
        distribution: &Distribution,
    ) -> ParameterValue;

    /// Human-readable sampler name.
    fn name(&self) -> &str;
}

/// Sampler selection for a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerKind {
    #[default]
    Random,
    Perturbation,
}

impl FromStr for SamplerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "perturbation" => Ok(Self::Perturbation),
            other => Err(format!(
                "unknown sampler {other:?}, expected \"random\" or \"perturbation\""
            )),
        }
    }
}

impl SamplerKind {
    pub fn build(self, seed: Option<u64>, exploration_weight: f64) -> Box<dyn Sampler> {
        match self {
            SamplerKind::Random => Box::new(RandomSampler::new(seed)),
            SamplerKind::Perturbation => {
                Box::new(PerturbationSampler::new(seed, exploration_weight))
            }
        }
    }
}

/// Reject distributions a sampler cannot draw from.
pub fn validate(name: &str, distribution: &Distribution) -> AoResult<()> {
    let problem = match distribution {
        Distribution::Categorical { choices } if choices.is_empty() => Some("no choices".to_string()),
        Distribution::IntUniform { low, high } if low > high => {
            Some(format!("low {low} is greater than high {high}"))
        }
        Distribution::Uniform { low, high } if !(low <= high) => {
            Some(format!("low {low} is greater than high {high}"))
        }
        Distribution::LogUniform { low, high } if !(*low > 0.0 && low <= high) => Some(format!(
            "log-uniform bounds must satisfy 0 < low <= high, got [{low}, {high}]"
        )),
        _ => None,
    };
    match problem {
        Some(message) => Err(StudyError::InvalidSuggestion {
            parameter: name.to_string(),
            message,
        }
        .into()),
        None => Ok(()),
    }
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Independent draw from a validated distribution.
fn draw<R: Rng + ?Sized>(rng: &mut R, distribution: &Distribution) -> ParameterValue {
    match distribution {
        Distribution::Uniform { low, high } => ParameterValue::Float(rng.gen_range(*low..=*high)),
        Distribution::IntUniform { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
        Distribution::LogUniform { low, high } => {
            let log_low = low.ln();
            let log_high = high.ln();
            let log_val: f64 = rng.gen_range(log_low..=log_high);
            // exp(ln(x)) can land a hair outside the bounds
            ParameterValue::Float(log_val.exp().clamp(*low, *high))
        }
        Distribution::Categorical { choices } => {
            let idx = rng.gen_range(0..choices.len());
            ParameterValue::Json(choices[idx].clone())
        }
    }
}

// ---- Random sampler ----

/// Independent random sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: ChaCha8Rng,
}

impl RandomSampler {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seeded_rng(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(
        &mut self,
        _context: &SamplingContext<'_>,
        _name: &str,
        distribution: &Distribution,
    ) -> ParameterValue {
        draw(&mut self.rng, distribution)
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Perturbation sampler ----

/// Explores randomly with probability `exploration_weight`, otherwise
/// perturbs the best completed trial's values.
///
/// The explore/exploit decision is taken once per trial so that all values
/// of one trial come from the same mode.
#[derive(Debug, Clone)]
pub struct PerturbationSampler {
    rng: ChaCha8Rng,
    exploration_weight: f64,
    mode: Option<(usize, bool)>,
}

impl PerturbationSampler {
    pub fn new(seed: Option<u64>, exploration_weight: f64) -> Self {
        Self {
            rng: seeded_rng(seed),
            exploration_weight,
            mode: None,
        }
    }

    fn best<'a>(context: &SamplingContext<'a>) -> Option<&'a FrozenTrial> {
        let mut best: Option<(&'a FrozenTrial, f64)> = None;
        for trial in context.history {
            let value = match (trial.state, trial.value) {
                (TrialState::Complete, Some(value)) => value,
                _ => continue,
            };
            if best.map_or(true, |(_, incumbent)| context.direction.improves(value, incumbent)) {
                best = Some((trial, value));
            }
        }
        best.map(|(trial, _)| trial)
    }

    fn exploring(&mut self, context: &SamplingContext<'_>) -> bool {
        match self.mode {
            Some((number, explore)) if number == context.trial_number => explore,
            _ => {
                let explore = Self::best(context).is_none()
                    || self.rng.gen::<f64>() < self.exploration_weight;
                self.mode = Some((context.trial_number, explore));
                explore
            }
        }
    }
}

impl Sampler for PerturbationSampler {
    fn sample(
        &mut self,
        context: &SamplingContext<'_>,
        name: &str,
        distribution: &Distribution,
    ) -> ParameterValue {
        if self.exploring(context) {
            return draw(&mut self.rng, distribution);
        }

        let base = Self::best(context).and_then(|t| t.params.get(name));
        match (distribution, base) {
            (Distribution::Uniform { low, high }, Some(ParameterValue::Float(v))) => {
                let range = high - low;
                let noise = self.rng.gen_range(-0.1..0.1) * range;
                ParameterValue::Float((v + noise).clamp(*low, *high))
            }
            (Distribution::IntUniform { low, high }, Some(ParameterValue::Int(v))) => {
                let delta: i64 = self.rng.gen_range(-2..=2);
                ParameterValue::Int((v + delta).clamp(*low, *high))
            }
            (Distribution::LogUniform { low, high }, Some(ParameterValue::Float(v))) if *v > 0.0 => {
                let log_v = v.ln();
                let log_range = high.ln() - low.ln();
                let noise = self.rng.gen_range(-0.1..0.1) * log_range;
                ParameterValue::Float((log_v + noise).exp().clamp(*low, *high))
            }
            // Fall back to random for choices or a missing base
            _ => draw(&mut self.rng, distribution),
        }
    }

    fn name(&self) -> &str {
        "perturbation"
    }
}
