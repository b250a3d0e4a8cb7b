//! # River Forecast
//!
//! A Rust library for multivariate river-level forecasting: windowed
//! training-set construction, reversible min-max normalization, chronological
//! splitting, a pluggable sequence regressor with random hyperparameter
//! search, and a validated multi-day prediction service.
//!
//! ## Features
//!
//! - Chronological series loading with date coercion and forward-filling
//! - Reversible per-station min-max scaling with JSON persistence
//! - Sliding-window (input, target) example construction for any horizon
//! - Leakage-free train/validation/test splitting by index cutoffs
//! - A regressor-agnostic model adapter with early stopping and random
//!   hyperparameter search
//! - A prediction service producing single multi-day forecasts and
//!   sliding-window trend scans with structured validation errors
//! - Per-station error and tolerance-precision evaluation
//!
//! ## Quick Start
//!
//! ```no_run
//! use river_forecast::data::{DataLoader, TableSchema};
//! use river_forecast::dataset::{make_windows, split};
//! use river_forecast::models::{
//!     DenseBuilder, DenseSpec, FitOptions, HyperParams, RegressorBuilder, SequenceModel,
//! };
//! use river_forecast::scaler::MinMaxScaler;
//!
//! fn main() -> river_forecast::error::Result<()> {
//!     // Load and normalize the historical table
//!     let schema = TableSchema::default();
//!     let series = DataLoader::from_csv("orinoco.csv", &schema)?;
//!     let scaler = MinMaxScaler::fit(series.columns(), series.rows())?;
//!     let normalized = scaler.transform(series.columns(), series.rows())?;
//!
//!     // Build windowed examples and split them chronologically
//!     let examples = make_windows(&normalized, 31, 7)?;
//!     let (train, val, _test) = split(examples, 0.6, 0.2)?;
//!
//!     // Train the shipped dense regressor and persist the artifacts
//!     let spec = DenseSpec {
//!         seq_len: 31,
//!         n_fields: series.columns().len(),
//!         horizon: 7,
//!     };
//!     let regressor = DenseBuilder::new(spec, 42).build(&HyperParams::default())?;
//!     let (model, _history) =
//!         SequenceModel::train(regressor, &train, &val, &FitOptions::default())?;
//!     model.persist("river_model.json")?;
//!     scaler.save("river_scaler.json")?;
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scaler;
pub mod serve;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{DataLoader, InputTable, RiverSeries, TableSchema};
pub use crate::dataset::{make_windows, sliding_inputs, split, WindowExample};
pub use crate::error::ForecastError;
pub use crate::metrics::{evaluate, evaluate_model, EvaluationReport};
pub use crate::models::{FitOptions, Regressor, SequenceModel};
pub use crate::scaler::{MinMaxScaler, ScalerState};
pub use crate::serve::{PredictionService, ServiceConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
