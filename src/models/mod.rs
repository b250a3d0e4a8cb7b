//! Forecast model adapter over an injected regressor capability
//!
//! The actual regressor is a black box behind the [`Regressor`] trait:
//! anything that can fit on windowed examples, predict a flat multi-horizon
//! vector, and persist itself. [`SequenceModel`] wraps one regressor and
//! owns the data contract: shape checks on the way in, reshaping the flat
//! output into horizon rows on the way out, and a lock so shared inference
//! never touches an unsynchronized capability.

use crate::dataset::WindowExample;
use crate::error::{ForecastError, Result};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub mod dense;
pub mod search;

pub use dense::{DenseBuilder, DenseRegressor, DenseSpec};
pub use search::{random_search, HyperParams, HyperSpace, Objective, SearchOutcome};

/// One model input: sequence-length rows of per-station readings
pub type InputWindow = Vec<Vec<f64>>;

/// Knobs for one training run
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FitOptions {
    /// Hard cap on training epochs
    pub max_epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Epochs without validation improvement before stopping and reverting
    /// to the best weights seen
    pub patience: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_epochs: 200,
            batch_size: 32,
            patience: 15,
        }
    }
}

impl FitOptions {
    /// Shorter budget used per hyperparameter-search trial
    pub fn for_search() -> Self {
        Self {
            max_epochs: 50,
            batch_size: 32,
            patience: 5,
        }
    }
}

/// Per-epoch training record returned by a fit run
#[derive(Debug, Clone, Default)]
pub struct FitHistory {
    pub train_loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub val_mae: Vec<f64>,
    pub best_epoch: usize,
    pub stopped_early: bool,
}

impl FitHistory {
    /// Epochs actually run
    pub fn epochs_run(&self) -> usize {
        self.train_loss.len()
    }

    /// Validation loss at the best epoch, if validation data was supplied
    pub fn best_val_loss(&self) -> Option<f64> {
        self.val_loss.get(self.best_epoch).copied()
    }

    /// Validation MAE at the best epoch, if validation data was supplied
    pub fn best_val_mae(&self) -> Option<f64> {
        self.val_mae.get(self.best_epoch).copied()
    }
}

/// The injected regression capability.
///
/// Implementations decide their own architecture and numerics; the adapter
/// only relies on the declared shapes and on `fit` honoring the early-stop
/// options.
pub trait Regressor: Send {
    /// Expected input shape as (sequence length, field count)
    fn input_shape(&self) -> (usize, usize);

    /// Length of the flat prediction vector (horizon × field count)
    fn output_len(&self) -> usize;

    /// Train on prepared inputs and flattened targets
    fn fit(
        &mut self,
        x: &[InputWindow],
        y: &[Vec<f64>],
        validation: Option<(&[InputWindow], &[Vec<f64>])>,
        opts: &FitOptions,
    ) -> Result<FitHistory>;

    /// Predict one flat multi-horizon vector for a single window
    fn predict(&self, input: &InputWindow) -> Result<Vec<f64>>;

    /// Persist the trained weights
    fn save(&self, path: &Path) -> Result<()>;
}

/// Builds a fresh regressor from a sampled hyperparameter configuration
pub trait RegressorBuilder {
    type Output: Regressor;

    fn build(&self, params: &HyperParams) -> Result<Self::Output>;
}

/// Convert window examples into regressor inputs and flattened targets.
///
/// Targets are flattened row-major, so a 7-day 4-station target becomes one
/// 28-value vector (day 1 stations first).
pub fn examples_to_xy(examples: &[WindowExample]) -> (Vec<InputWindow>, Vec<Vec<f64>>) {
    let x = examples.iter().map(|ex| ex.input.clone()).collect();
    let y = examples
        .iter()
        .map(|ex| ex.target.iter().flatten().copied().collect())
        .collect();
    (x, y)
}

/// Adapter around a trained regressor: stable predict/persist contract plus
/// the multi-horizon reshape.
pub struct SequenceModel {
    regressor: Mutex<Box<dyn Regressor>>,
    seq_len: usize,
    n_fields: usize,
    horizon: usize,
}

impl std::fmt::Debug for SequenceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceModel")
            .field("seq_len", &self.seq_len)
            .field("n_fields", &self.n_fields)
            .field("horizon", &self.horizon)
            .finish()
    }
}

impl SequenceModel {
    /// Wrap an already trained regressor
    pub fn from_regressor<R: Regressor + 'static>(regressor: R) -> Result<Self> {
        let (seq_len, n_fields) = regressor.input_shape();
        let output_len = regressor.output_len();
        if n_fields == 0 || output_len == 0 || output_len % n_fields != 0 {
            return Err(ForecastError::ArtifactLoad(format!(
                "regressor output length {} is not a whole number of {}-field rows",
                output_len, n_fields
            )));
        }
        Ok(Self {
            horizon: output_len / n_fields,
            regressor: Mutex::new(Box::new(regressor)),
            seq_len,
            n_fields,
        })
    }

    /// Train a regressor on windowed examples and wrap the result.
    ///
    /// Any failure inside the capability is surfaced as `TrainingFailed`;
    /// a diverged run is never silently retried.
    pub fn train<R: Regressor + 'static>(
        mut regressor: R,
        train_examples: &[WindowExample],
        val_examples: &[WindowExample],
        opts: &FitOptions,
    ) -> Result<(Self, FitHistory)> {
        if train_examples.is_empty() {
            return Err(ForecastError::EmptyInput(
                "no training examples".to_string(),
            ));
        }

        let (seq_len, n_fields) = regressor.input_shape();
        let output_len = regressor.output_len();
        for ex in train_examples.iter().chain(val_examples) {
            if ex.input.len() != seq_len || ex.input.iter().any(|row| row.len() != n_fields) {
                return Err(ForecastError::SchemaMismatch(format!(
                    "example input is {}x{} but the regressor expects {}x{}",
                    ex.input.len(),
                    ex.input.first().map(|row| row.len()).unwrap_or(0),
                    seq_len,
                    n_fields
                )));
            }
            let target_len: usize = ex.target.iter().map(|row| row.len()).sum();
            if target_len != output_len {
                return Err(ForecastError::SchemaMismatch(format!(
                    "example target has {} values but the regressor outputs {}",
                    target_len, output_len
                )));
            }
        }

        let (x_train, y_train) = examples_to_xy(train_examples);
        let (x_val, y_val) = examples_to_xy(val_examples);
        let validation = if val_examples.is_empty() {
            None
        } else {
            Some((x_val.as_slice(), y_val.as_slice()))
        };

        let history = regressor
            .fit(&x_train, &y_train, validation, opts)
            .map_err(|e| match e {
                ForecastError::TrainingFailed(msg) => ForecastError::TrainingFailed(msg),
                other => ForecastError::TrainingFailed(other.to_string()),
            })?;

        Ok((Self::from_regressor(regressor)?, history))
    }

    /// Predict the next `horizon` rows for one normalized input window
    pub fn predict(&self, input: &InputWindow) -> Result<Vec<Vec<f64>>> {
        if input.len() != self.seq_len || input.iter().any(|row| row.len() != self.n_fields) {
            return Err(ForecastError::SchemaMismatch(format!(
                "input window is {}x{} but the model expects {}x{}",
                input.len(),
                input.first().map(|row| row.len()).unwrap_or(0),
                self.seq_len,
                self.n_fields
            )));
        }

        let flat = {
            let guard = self
                .regressor
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.predict(input)?
        };
        if flat.len() != self.horizon * self.n_fields {
            return Err(ForecastError::ArtifactLoad(format!(
                "regressor returned {} values, expected {} ({} days x {} stations)",
                flat.len(),
                self.horizon * self.n_fields,
                self.horizon,
                self.n_fields
            )));
        }

        Ok(flat
            .chunks(self.n_fields)
            .map(|chunk| chunk.to_vec())
            .collect())
    }

    /// Persist the underlying regressor
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let guard = self
            .regressor
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.save(path.as_ref())
    }

    /// Load a persisted dense regressor and check it against the expected
    /// dimensions before serving with it.
    pub fn load_dense<P: AsRef<Path>>(path: P, expected: &DenseSpec) -> Result<Self> {
        let regressor = DenseRegressor::load(path.as_ref())?;
        let (seq_len, n_fields) = regressor.input_shape();
        if seq_len != expected.seq_len
            || n_fields != expected.n_fields
            || regressor.output_len() != expected.output_len()
        {
            return Err(ForecastError::ArtifactLoad(format!(
                "model {} was trained for {}x{} -> {} values but the service expects {}x{} -> {}",
                path.as_ref().display(),
                seq_len,
                n_fields,
                regressor.output_len(),
                expected.seq_len,
                expected.n_fields,
                expected.output_len()
            )));
        }
        Self::from_regressor(regressor)
    }

    /// Sequence length the model consumes
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Stations per row
    pub fn n_fields(&self) -> usize {
        self.n_fields
    }

    /// Days predicted per inference
    pub fn horizon(&self) -> usize {
        self.horizon
    }
}
