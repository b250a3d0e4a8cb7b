//! A small dense sequence regressor shipped as the default capability
//!
//! One hidden tanh layer over the flattened input window, a linear output
//! head of horizon × station values, mini-batch gradient descent with L2
//! weight decay, and Keras-style early stopping that restores the best
//! validation weights.

use crate::error::{ForecastError, Result};
use crate::models::search::HyperParams;
use crate::models::{FitHistory, FitOptions, InputWindow, Regressor, RegressorBuilder};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Fixed problem dimensions a dense regressor is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseSpec {
    /// Rows per input window
    pub seq_len: usize,
    /// Stations per row
    pub n_fields: usize,
    /// Days predicted per inference
    pub horizon: usize,
}

impl DenseSpec {
    /// Flattened input width
    pub fn input_len(&self) -> usize {
        self.seq_len * self.n_fields
    }

    /// Flat output width
    pub fn output_len(&self) -> usize {
        self.horizon * self.n_fields
    }
}

/// Dense regressor weights and knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseRegressor {
    seq_len: usize,
    n_fields: usize,
    horizon: usize,
    hidden: usize,
    learning_rate: f64,
    l2: f64,
    seed: u64,
    w1: Vec<f64>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: Vec<f64>,
}

impl DenseRegressor {
    /// Create an untrained regressor with randomly initialized weights
    pub fn new(spec: &DenseSpec, params: &HyperParams, seed: u64) -> Result<Self> {
        if spec.seq_len == 0 || spec.n_fields == 0 || spec.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "sequence length, field count and horizon must be positive".to_string(),
            ));
        }
        if params.hidden_units == 0 {
            return Err(ForecastError::InvalidParameter(
                "hidden_units must be positive".to_string(),
            ));
        }
        if !(params.learning_rate > 0.0 && params.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive and finite, got {}",
                params.learning_rate
            )));
        }
        if !(params.l2 >= 0.0 && params.l2.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "l2 must be non-negative and finite, got {}",
                params.l2
            )));
        }

        let n_in = spec.input_len();
        let n_out = spec.output_len();
        let hidden = params.hidden_units;
        let mut rng = StdRng::seed_from_u64(seed);

        let init_w1 = Normal::new(0.0, (1.0 / n_in as f64).sqrt())
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        let init_w2 = Normal::new(0.0, (1.0 / hidden as f64).sqrt())
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;

        Ok(Self {
            seq_len: spec.seq_len,
            n_fields: spec.n_fields,
            horizon: spec.horizon,
            hidden,
            learning_rate: params.learning_rate,
            l2: params.l2,
            seed,
            w1: (0..hidden * n_in).map(|_| init_w1.sample(&mut rng)).collect(),
            b1: vec![0.0; hidden],
            w2: (0..n_out * hidden).map(|_| init_w2.sample(&mut rng)).collect(),
            b2: vec![0.0; n_out],
        })
    }

    /// Load persisted weights, failing fast on anything unreadable
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::ArtifactLoad(format!("cannot open model {}: {}", path.display(), e))
        })?;
        let model: DenseRegressor =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                ForecastError::ArtifactLoad(format!(
                    "cannot parse model {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let spec = DenseSpec {
            seq_len: model.seq_len,
            n_fields: model.n_fields,
            horizon: model.horizon,
        };
        if model.w1.len() != model.hidden * spec.input_len()
            || model.b1.len() != model.hidden
            || model.w2.len() != spec.output_len() * model.hidden
            || model.b2.len() != spec.output_len()
        {
            return Err(ForecastError::ArtifactLoad(format!(
                "model {} has weight shapes inconsistent with its declared dimensions",
                path.display()
            )));
        }
        Ok(model)
    }

    fn flatten(&self, input: &InputWindow) -> Result<Vec<f64>> {
        if input.len() != self.seq_len || input.iter().any(|row| row.len() != self.n_fields) {
            return Err(ForecastError::SchemaMismatch(format!(
                "input window is {}x{} but this regressor expects {}x{}",
                input.len(),
                input.first().map(|row| row.len()).unwrap_or(0),
                self.seq_len,
                self.n_fields
            )));
        }
        Ok(input.iter().flatten().copied().collect())
    }

    /// Forward pass returning hidden activations and outputs
    fn forward(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let n_in = self.seq_len * self.n_fields;
        let n_out = self.horizon * self.n_fields;

        let mut h = vec![0.0; self.hidden];
        for j in 0..self.hidden {
            let mut z = self.b1[j];
            let weights = &self.w1[j * n_in..(j + 1) * n_in];
            for (w, xv) in weights.iter().zip(x) {
                z += w * xv;
            }
            h[j] = z.tanh();
        }

        let mut out = vec![0.0; n_out];
        for o in 0..n_out {
            let mut z = self.b2[o];
            let weights = &self.w2[o * self.hidden..(o + 1) * self.hidden];
            for (w, hv) in weights.iter().zip(&h) {
                z += w * hv;
            }
            out[o] = z;
        }
        (h, out)
    }

    /// Mean squared error and mean absolute error over a prepared set
    fn losses(&self, x: &[Vec<f64>], y: &[Vec<f64>]) -> (f64, f64) {
        let mut sq = 0.0;
        let mut abs = 0.0;
        let mut count = 0usize;
        for (xi, yi) in x.iter().zip(y) {
            let (_, out) = self.forward(xi);
            for (p, t) in out.iter().zip(yi) {
                sq += (p - t) * (p - t);
                abs += (p - t).abs();
                count += 1;
            }
        }
        if count == 0 {
            (0.0, 0.0)
        } else {
            (sq / count as f64, abs / count as f64)
        }
    }

    fn snapshot(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        (
            self.w1.clone(),
            self.b1.clone(),
            self.w2.clone(),
            self.b2.clone(),
        )
    }

    fn restore(&mut self, weights: (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)) {
        self.w1 = weights.0;
        self.b1 = weights.1;
        self.w2 = weights.2;
        self.b2 = weights.3;
    }

    /// One mini-batch gradient step
    fn train_batch(&mut self, x: &[Vec<f64>], y: &[Vec<f64>], batch: &[usize]) {
        let n_in = self.seq_len * self.n_fields;
        let n_out = self.horizon * self.n_fields;

        let mut g_w1 = vec![0.0; self.w1.len()];
        let mut g_b1 = vec![0.0; self.b1.len()];
        let mut g_w2 = vec![0.0; self.w2.len()];
        let mut g_b2 = vec![0.0; self.b2.len()];

        for &idx in batch {
            let xi = &x[idx];
            let yi = &y[idx];
            let (h, out) = self.forward(xi);

            let d_out: Vec<f64> = out
                .iter()
                .zip(yi)
                .map(|(p, t)| 2.0 * (p - t) / n_out as f64)
                .collect();

            for o in 0..n_out {
                g_b2[o] += d_out[o];
                for j in 0..self.hidden {
                    g_w2[o * self.hidden + j] += d_out[o] * h[j];
                }
            }

            for j in 0..self.hidden {
                let mut dh = 0.0;
                for o in 0..n_out {
                    dh += d_out[o] * self.w2[o * self.hidden + j];
                }
                let dz = dh * (1.0 - h[j] * h[j]);
                g_b1[j] += dz;
                for k in 0..n_in {
                    g_w1[j * n_in + k] += dz * xi[k];
                }
            }
        }

        let scale = self.learning_rate / batch.len() as f64;
        let decay = self.learning_rate * self.l2;
        for (w, g) in self.w1.iter_mut().zip(&g_w1) {
            *w -= scale * g + decay * *w;
        }
        for (b, g) in self.b1.iter_mut().zip(&g_b1) {
            *b -= scale * g;
        }
        for (w, g) in self.w2.iter_mut().zip(&g_w2) {
            *w -= scale * g + decay * *w;
        }
        for (b, g) in self.b2.iter_mut().zip(&g_b2) {
            *b -= scale * g;
        }
    }
}

impl Regressor for DenseRegressor {
    fn input_shape(&self) -> (usize, usize) {
        (self.seq_len, self.n_fields)
    }

    fn output_len(&self) -> usize {
        self.horizon * self.n_fields
    }

    fn fit(
        &mut self,
        x: &[InputWindow],
        y: &[Vec<f64>],
        validation: Option<(&[InputWindow], &[Vec<f64>])>,
        opts: &FitOptions,
    ) -> Result<FitHistory> {
        if x.is_empty() {
            return Err(ForecastError::EmptyInput(
                "no training inputs".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} inputs for {} targets",
                x.len(),
                y.len()
            )));
        }
        if opts.max_epochs == 0 || opts.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_epochs and batch_size must be positive".to_string(),
            ));
        }

        let n_out = self.horizon * self.n_fields;
        let x_flat: Vec<Vec<f64>> = x.iter().map(|w| self.flatten(w)).collect::<Result<_>>()?;
        for target in y {
            if target.len() != n_out {
                return Err(ForecastError::SchemaMismatch(format!(
                    "target has {} values but this regressor outputs {}",
                    target.len(),
                    n_out
                )));
            }
        }
        let val_flat: Option<(Vec<Vec<f64>>, &[Vec<f64>])> = match validation {
            Some((vx, vy)) => {
                let flat = vx.iter().map(|w| self.flatten(w)).collect::<Result<_>>()?;
                Some((flat, vy))
            }
            None => None,
        };

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let mut indices: Vec<usize> = (0..x_flat.len()).collect();
        let mut history = FitHistory::default();
        let mut best_monitor = f64::INFINITY;
        let mut best_weights = self.snapshot();
        let mut wait = 0usize;

        for epoch in 0..opts.max_epochs {
            indices.shuffle(&mut rng);
            for batch in indices.chunks(opts.batch_size) {
                self.train_batch(&x_flat, y, batch);
            }

            let (train_loss, _) = self.losses(&x_flat, y);
            history.train_loss.push(train_loss);

            let monitor = match &val_flat {
                Some((vx, vy)) => {
                    let (val_loss, val_mae) = self.losses(vx, vy);
                    history.val_loss.push(val_loss);
                    history.val_mae.push(val_mae);
                    val_loss
                }
                None => train_loss,
            };

            if !monitor.is_finite() {
                return Err(ForecastError::TrainingFailed(format!(
                    "loss diverged to a non-finite value at epoch {}",
                    epoch + 1
                )));
            }

            if monitor < best_monitor {
                best_monitor = monitor;
                best_weights = self.snapshot();
                history.best_epoch = epoch;
                wait = 0;
            } else {
                wait += 1;
                if wait >= opts.patience {
                    history.stopped_early = true;
                    break;
                }
            }
        }

        self.restore(best_weights);
        Ok(history)
    }

    fn predict(&self, input: &InputWindow) -> Result<Vec<f64>> {
        let x = self.flatten(input)?;
        let (_, out) = self.forward(&x);
        Ok(out)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(file, self)
            .map_err(|e| ForecastError::ArtifactLoad(format!("cannot write model: {}", e)))
    }
}

/// Builds dense regressors for a fixed problem shape
#[derive(Debug, Clone, Copy)]
pub struct DenseBuilder {
    pub spec: DenseSpec,
    pub seed: u64,
}

impl DenseBuilder {
    pub fn new(spec: DenseSpec, seed: u64) -> Self {
        Self { spec, seed }
    }
}

impl RegressorBuilder for DenseBuilder {
    type Output = DenseRegressor;

    fn build(&self, params: &HyperParams) -> Result<DenseRegressor> {
        DenseRegressor::new(&self.spec, params, self.seed)
    }
}
