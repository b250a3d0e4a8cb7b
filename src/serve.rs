//! Request-time prediction service: validated single-window forecasts and
//! sliding-window trend scans
//!
//! The service owns the read-only process state (trained model + fitted
//! scaler), loaded once at startup and passed in explicitly. Both operations
//! are stateless per request and safe to call from multiple threads.

use crate::data::{InputTable, TableSchema};
use crate::dataset::sliding_inputs;
use crate::error::{ForecastError, Result};
use crate::models::{DenseSpec, SequenceModel};
use crate::scaler::ScalerState;
use crate::utils::{future_dates, round2};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Serving-side pipeline configuration
#[derive(Debug, Clone, serde::Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Rows every input window must supply
    pub sequence_length: usize,
    /// Days predicted per window
    pub horizon: usize,
    /// Expected station columns and recognized date-column names
    pub schema: TableSchema,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sequence_length: 31,
            horizon: 7,
            schema: TableSchema::default(),
        }
    }
}

/// One forecasted day: denormalized level per station, plus the calendar
/// date when the request carried one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    #[serde(flatten)]
    pub levels: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// Response body for a single-window forecast
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    #[serde(rename = "7_day_prediction")]
    pub prediction: Vec<PredictionRecord>,
}

/// One trend-scan entry, tagged with its window's start row
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub window_start_row: usize,
    #[serde(rename = "7_day_prediction")]
    pub prediction: Vec<PredictionRecord>,
}

/// Response body for a trend scan
#[derive(Debug, Clone, Serialize)]
pub struct TrendResponse {
    pub trend: Vec<TrendPoint>,
}

/// Structured error body for validation failures
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&ForecastError> for ErrorResponse {
    fn from(err: &ForecastError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Translate an operation result into a JSON body, mapping every error onto
/// the `{"error": ...}` shape instead of propagating it.
pub fn into_response<T: Serialize>(result: Result<T>) -> serde_json::Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("response serialization failed: {}", e) })
        }),
        Err(err) => serde_json::json!({ "error": err.to_string() }),
    }
}

/// Multi-day prediction service over a loaded model and scaler
#[derive(Debug)]
pub struct PredictionService {
    model: SequenceModel,
    scaler: ScalerState,
    config: ServiceConfig,
}

impl PredictionService {
    /// Assemble the service, cross-checking the loaded artifacts against the
    /// configured pipeline dimensions.
    pub fn new(model: SequenceModel, scaler: ScalerState, config: ServiceConfig) -> Result<Self> {
        if model.seq_len() != config.sequence_length
            || model.horizon() != config.horizon
            || model.n_fields() != scaler.n_columns()
        {
            return Err(ForecastError::ArtifactLoad(format!(
                "model ({} rows x {} stations -> {} days) does not match the configured \
                 pipeline ({} rows x {} stations -> {} days)",
                model.seq_len(),
                model.n_fields(),
                model.horizon(),
                config.sequence_length,
                scaler.n_columns(),
                config.horizon
            )));
        }

        let mut configured: Vec<&String> = config.schema.stations.iter().collect();
        let mut fitted: Vec<&String> = scaler.columns().iter().collect();
        configured.sort();
        fitted.sort();
        if configured != fitted {
            return Err(ForecastError::ArtifactLoad(format!(
                "scaler was fitted on columns [{}] but the service is configured for [{}]",
                scaler.columns().join(", "),
                config.schema.stations.join(", ")
            )));
        }

        Ok(Self {
            model,
            scaler,
            config,
        })
    }

    /// Load the persisted scaler and dense model artifacts and assemble the
    /// service. Intended to run once at process start.
    pub fn from_artifacts<P: AsRef<Path>>(
        model_path: P,
        scaler_path: P,
        config: ServiceConfig,
    ) -> Result<Self> {
        let scaler = ScalerState::load(scaler_path)?;
        let spec = DenseSpec {
            seq_len: config.sequence_length,
            n_fields: scaler.n_columns(),
            horizon: config.horizon,
        };
        let model = SequenceModel::load_dense(model_path, &spec)?;
        Self::new(model, scaler, config)
    }

    /// Forecast the next `horizon` days from a table of exactly
    /// `sequence_length` rows.
    pub fn predict_once(&self, table: &InputTable) -> Result<ForecastResponse> {
        let required = self.config.sequence_length;
        if table.n_rows() != required {
            return Err(ForecastError::InsufficientData(format!(
                "the table must have exactly {} rows of data, got {}",
                required,
                table.n_rows()
            )));
        }

        let matrix = self.validate_matrix(table)?;
        let dates = table
            .date_column()
            .and_then(|_| table.last_valid_date(0, table.n_rows()))
            .map(|last| future_dates(last, self.config.horizon));

        Ok(ForecastResponse {
            prediction: self.forecast_window(&matrix, dates)?,
        })
    }

    /// Run the single-window pipeline at every valid offset of a buffer with
    /// at least `sequence_length` rows, in increasing offset order.
    pub fn predict_trend(&self, table: &InputTable) -> Result<TrendResponse> {
        let required = self.config.sequence_length;
        if table.n_rows() < required {
            return Err(ForecastError::InsufficientData(format!(
                "the table must have at least {} rows of data, got {}",
                required,
                table.n_rows()
            )));
        }

        let matrix = self.validate_matrix(table)?;
        let mut trend = Vec::with_capacity(matrix.len() - required + 1);
        for (start, window) in sliding_inputs(&matrix, required)?.into_iter().enumerate() {
            let dates = table
                .date_column()
                .and_then(|_| table.last_valid_date(start, start + required))
                .map(|last| future_dates(last, self.config.horizon));
            trend.push(TrendPoint {
                window_start_row: start,
                prediction: self.forecast_window(window, dates)?,
            });
        }

        Ok(TrendResponse { trend })
    }

    /// Validate the table's columns and cells and assemble rows in the
    /// scaler's fitted column order.
    fn validate_matrix(&self, table: &InputTable) -> Result<Vec<Vec<f64>>> {
        let fitted = self.scaler.columns();

        let missing: Vec<&str> = fitted
            .iter()
            .filter(|name| !table.columns().contains(name))
            .map(|name| name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::SchemaMismatch(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        let unexpected: Vec<&str> = table
            .columns()
            .iter()
            .filter(|name| !fitted.contains(name))
            .map(|name| name.as_str())
            .collect();
        if !unexpected.is_empty() {
            return Err(ForecastError::SchemaMismatch(format!(
                "unexpected column(s): {}",
                unexpected.join(", ")
            )));
        }

        // Columns match as a set; map each fitted column to its position in
        // the table so rows come out in fit order.
        let positions: Vec<usize> = fitted
            .iter()
            .map(|name| {
                table
                    .columns()
                    .iter()
                    .position(|col| col == name)
                    .unwrap_or_default()
            })
            .collect();

        let mut matrix = Vec::with_capacity(table.n_rows());
        for row_index in 0..table.n_rows() {
            let raw = table.row(row_index);
            let mut row = Vec::with_capacity(fitted.len());
            for (name, &pos) in fitted.iter().zip(&positions) {
                let cell = raw[pos].trim();
                if cell.is_empty() {
                    return Err(ForecastError::DataQuality(format!(
                        "empty cell in column '{}' at row {}",
                        name, row_index
                    )));
                }
                let value: f64 = cell.parse().map_err(|_| {
                    ForecastError::DataQuality(format!(
                        "non-numeric value '{}' in column '{}' at row {}",
                        cell, name, row_index
                    ))
                })?;
                row.push(value);
            }
            matrix.push(row);
        }

        Ok(matrix)
    }

    /// Transform, predict, reshape, and denormalize one window
    fn forecast_window(
        &self,
        window: &[Vec<f64>],
        dates: Option<Vec<NaiveDate>>,
    ) -> Result<Vec<PredictionRecord>> {
        let normalized = self.scaler.transform(self.scaler.columns(), window)?;
        let predicted = self.model.predict(&normalized)?;
        let levels = self.scaler.inverse(&predicted)?;

        let records = levels
            .into_iter()
            .enumerate()
            .map(|(day, row)| PredictionRecord {
                levels: self
                    .scaler
                    .columns()
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(round2))
                    .collect(),
                date: dates.as_ref().map(|parsed| parsed[day]),
            })
            .collect();
        Ok(records)
    }

    /// Stations served, in the scaler's fitted order
    pub fn stations(&self) -> &[String] {
        self.scaler.columns()
    }

    /// Serving configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
