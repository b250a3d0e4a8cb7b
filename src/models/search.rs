//! Random hyperparameter search over independently sampled configurations

use crate::dataset::WindowExample;
use crate::error::{ForecastError, Result};
use crate::models::{examples_to_xy, FitHistory, FitOptions, Regressor, RegressorBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One sampled configuration: the regressor's structural and regularization
/// knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    pub hidden_units: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            hidden_units: 64,
            learning_rate: 0.05,
            l2: 1e-4,
        }
    }
}

/// The search space configurations are drawn from.
///
/// Hidden units are sampled on a stepped grid; learning rate and L2 penalty
/// are sampled log-uniformly between their bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperSpace {
    pub hidden_min: usize,
    pub hidden_max: usize,
    pub hidden_step: usize,
    pub learning_rate: (f64, f64),
    pub l2: (f64, f64),
}

impl Default for HyperSpace {
    fn default() -> Self {
        Self {
            hidden_min: 16,
            hidden_max: 128,
            hidden_step: 16,
            learning_rate: (1e-3, 1e-1),
            l2: (1e-6, 1e-2),
        }
    }
}

impl HyperSpace {
    fn validate(&self) -> Result<()> {
        if self.hidden_min == 0 || self.hidden_step == 0 || self.hidden_max < self.hidden_min {
            return Err(ForecastError::InvalidParameter(format!(
                "hidden unit grid {}..={} step {} is not sampleable",
                self.hidden_min, self.hidden_max, self.hidden_step
            )));
        }
        for (name, (lo, hi)) in [("learning_rate", self.learning_rate), ("l2", self.l2)] {
            if !(lo > 0.0 && hi >= lo && hi.is_finite()) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} bounds ({}, {}) must be positive and ordered",
                    name, lo, hi
                )));
            }
        }
        Ok(())
    }

    /// Draw one configuration
    pub fn sample<R: Rng>(&self, rng: &mut R) -> HyperParams {
        let steps = (self.hidden_max - self.hidden_min) / self.hidden_step;
        let hidden_units = self.hidden_min + self.hidden_step * rng.gen_range(0..=steps);
        HyperParams {
            hidden_units,
            learning_rate: sample_log_uniform(rng, self.learning_rate),
            l2: sample_log_uniform(rng, self.l2),
        }
    }
}

fn sample_log_uniform<R: Rng>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    if lo == hi {
        return lo;
    }
    let exponent = rng.gen_range(lo.log10()..=hi.log10());
    10f64.powf(exponent)
}

/// Scalar validation objective a trial is scored by; lower is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    ValLoss,
    ValMae,
}

impl Objective {
    /// Score a finished trial from its history
    pub fn score(&self, history: &FitHistory) -> Option<f64> {
        match self {
            Objective::ValLoss => history.best_val_loss(),
            Objective::ValMae => history.best_val_mae(),
        }
    }
}

/// One evaluated configuration
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub params: HyperParams,
    pub score: f64,
    pub history: FitHistory,
}

/// Result of a full search run
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: TrialOutcome,
    pub trials: Vec<TrialOutcome>,
}

/// Evaluate `trials` independently sampled configurations and return the one
/// with the best validation objective.
///
/// Each trial trains a fresh regressor under the (typically capped) fit
/// options with its own early stopping. Ties keep the first-found
/// configuration; trials are mutually independent, so the winner does not
/// depend on evaluation order.
pub fn random_search<B: RegressorBuilder>(
    builder: &B,
    space: &HyperSpace,
    train_examples: &[WindowExample],
    val_examples: &[WindowExample],
    trials: usize,
    opts: &FitOptions,
    objective: Objective,
    seed: u64,
) -> Result<SearchOutcome> {
    if trials == 0 {
        return Err(ForecastError::InvalidParameter(
            "at least one trial is required".to_string(),
        ));
    }
    if train_examples.is_empty() {
        return Err(ForecastError::EmptyInput(
            "no training examples".to_string(),
        ));
    }
    if val_examples.is_empty() {
        return Err(ForecastError::EmptyInput(
            "hyperparameter search needs a validation segment to score trials".to_string(),
        ));
    }
    space.validate()?;

    let (x_train, y_train) = examples_to_xy(train_examples);
    let (x_val, y_val) = examples_to_xy(val_examples);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut outcomes: Vec<TrialOutcome> = Vec::with_capacity(trials);
    let mut best: Option<usize> = None;

    for _ in 0..trials {
        let params = space.sample(&mut rng);
        let mut regressor = builder.build(&params)?;
        let history = regressor
            .fit(
                &x_train,
                &y_train,
                Some((x_val.as_slice(), y_val.as_slice())),
                opts,
            )
            .map_err(|e| match e {
                ForecastError::TrainingFailed(msg) => ForecastError::TrainingFailed(msg),
                other => ForecastError::TrainingFailed(other.to_string()),
            })?;
        let score = objective.score(&history).ok_or_else(|| {
            ForecastError::TrainingFailed(
                "trial produced no validation score".to_string(),
            )
        })?;

        outcomes.push(TrialOutcome {
            params,
            score,
            history,
        });
        let current = outcomes.len() - 1;
        // Strict comparison keeps the earliest of tied trials.
        if best.map_or(true, |b| score < outcomes[b].score) {
            best = Some(current);
        }
    }

    let best_index = best.unwrap_or(0);
    Ok(SearchOutcome {
        best: outcomes[best_index].clone(),
        trials: outcomes,
    })
}
