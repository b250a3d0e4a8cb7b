//! Min-max normalization with an exact algebraic inverse

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Min-max scaler: fits once, then the state is immutable.
#[derive(Debug, Clone, Copy)]
pub struct MinMaxScaler;

/// Fitted per-column scaling parameters.
///
/// `transform` maps each column affinely onto the fitted `[min, max]` range
/// (values outside the range extrapolate past `[0, 1]`); `inverse` is the
/// exact algebraic inverse. A column with zero range scales by an implicit
/// divisor of 1 so the round-trip stays exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    columns: Vec<String>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit per-column minima and maxima over all rows
    pub fn fit(columns: &[String], rows: &[Vec<f64>]) -> Result<ScalerState> {
        if rows.is_empty() {
            return Err(ForecastError::EmptyInput(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let mut mins = vec![f64::INFINITY; columns.len()];
        let mut maxs = vec![f64::NEG_INFINITY; columns.len()];
        for row in rows {
            if row.len() != columns.len() {
                return Err(ForecastError::SchemaMismatch(format!(
                    "row has {} values but the scaler is fitting {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            for (i, &value) in row.iter().enumerate() {
                mins[i] = mins[i].min(value);
                maxs[i] = maxs[i].max(value);
            }
        }

        Ok(ScalerState {
            columns: columns.to_vec(),
            mins,
            maxs,
        })
    }
}

impl ScalerState {
    /// Fitted column names, in fit order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of fitted columns
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Apply the forward transform to rows carrying exactly the fitted
    /// column set, in the fitted order.
    pub fn transform(&self, columns: &[String], rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if columns != self.columns.as_slice() {
            return Err(ForecastError::SchemaMismatch(format!(
                "expected columns [{}], got [{}]",
                self.columns.join(", "),
                columns.join(", ")
            )));
        }

        rows.iter()
            .map(|row| {
                if row.len() != self.columns.len() {
                    return Err(ForecastError::SchemaMismatch(format!(
                        "row has {} values but the scaler was fitted on {} columns",
                        row.len(),
                        self.columns.len()
                    )));
                }
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(i, &value)| (value - self.mins[i]) / self.range(i))
                    .collect())
            })
            .collect()
    }

    /// Apply the exact inverse transform
    pub fn inverse(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.columns.len() {
                    return Err(ForecastError::SchemaMismatch(format!(
                        "row has {} values but the scaler was fitted on {} columns",
                        row.len(),
                        self.columns.len()
                    )));
                }
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(i, &value)| value * self.range(i) + self.mins[i])
                    .collect())
            })
            .collect()
    }

    /// Persist the fitted state as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| ForecastError::ArtifactLoad(format!("cannot write scaler: {}", e)))
    }

    /// Load a previously fitted state
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::ArtifactLoad(format!("cannot open scaler {}: {}", path.display(), e))
        })?;
        let state: ScalerState = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ForecastError::ArtifactLoad(format!("cannot parse scaler {}: {}", path.display(), e))
        })?;
        if state.columns.is_empty()
            || state.columns.len() != state.mins.len()
            || state.columns.len() != state.maxs.len()
        {
            return Err(ForecastError::ArtifactLoad(format!(
                "scaler {} has inconsistent column parameters",
                path.display()
            )));
        }
        Ok(state)
    }

    fn range(&self, i: usize) -> f64 {
        let range = self.maxs[i] - self.mins[i];
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }
}
