//! Metrics for evaluating forecast quality over held-out windows

use crate::dataset::WindowExample;
use crate::error::{ForecastError, Result};
use crate::models::SequenceModel;
use crate::scaler::ScalerState;
use num_traits::Float;
use statrs::statistics::Statistics;

/// Relative error band a prediction must land in to count as precise
pub const PRECISION_TOLERANCE: f64 = 0.05;

/// Mean absolute error; NaN when the slices are empty or mismatched
pub fn mean_absolute_error<F: Float>(actual: &[F], predicted: &[F]) -> F {
    if actual.is_empty() || actual.len() != predicted.len() {
        return F::nan();
    }
    let sum = actual
        .iter()
        .zip(predicted)
        .fold(F::zero(), |acc, (a, p)| acc + (*a - *p).abs());
    sum / F::from(actual.len()).unwrap_or_else(F::one)
}

/// Mean squared error; NaN when the slices are empty or mismatched
pub fn mean_squared_error<F: Float>(actual: &[F], predicted: &[F]) -> F {
    if actual.is_empty() || actual.len() != predicted.len() {
        return F::nan();
    }
    let sum = actual
        .iter()
        .zip(predicted)
        .fold(F::zero(), |acc, (a, p)| acc + (*a - *p) * (*a - *p));
    sum / F::from(actual.len()).unwrap_or_else(F::one)
}

/// Coefficient of determination.
///
/// A constant true series has no variance to explain: R² is 1 for an exact
/// prediction and 0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    let mean = actual.iter().mean();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Percentage of predictions within the relative tolerance of the truth.
///
/// A true value of exactly 0 admits only a prediction of exactly 0; a small
/// non-zero guess against a zero truth is counted as a miss.
pub fn tolerance_precision(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    let within = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| (*p - *a).abs() <= PRECISION_TOLERANCE * a.abs())
        .count();
    100.0 * within as f64 / actual.len() as f64
}

/// Error and precision metrics for one station
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Share of predictions within the 5% tolerance band
    pub precision_pct: f64,
}

/// Per-station metrics plus the precision aggregated over every station and
/// horizon step
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub fields: Vec<(String, FieldMetrics)>,
    pub overall_precision_pct: f64,
}

impl std::fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, metrics) in &self.fields {
            writeln!(f, "Metrics for {}:", name)?;
            writeln!(f, "  MSE:           {:.4}", metrics.mse)?;
            writeln!(f, "  MAE:           {:.4}", metrics.mae)?;
            writeln!(f, "  R2:            {:.4}", metrics.r2)?;
            writeln!(f, "  Precision (%): {:.2}", metrics.precision_pct)?;
        }
        writeln!(
            f,
            "Overall Precision (%): {:.2}",
            self.overall_precision_pct
        )?;
        Ok(())
    }
}

/// Evaluate predicted horizon windows against the true ones.
///
/// Outer slice indexes examples, middle the horizon step, inner the station;
/// predictions and truth must share that exact shape.
pub fn evaluate(
    y_true: &[Vec<Vec<f64>>],
    y_pred: &[Vec<Vec<f64>>],
    stations: &[String],
) -> Result<EvaluationReport> {
    if y_true.is_empty() {
        return Err(ForecastError::EmptyInput(
            "nothing to evaluate".to_string(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(ForecastError::SchemaMismatch(format!(
            "{} true windows against {} predicted windows",
            y_true.len(),
            y_pred.len()
        )));
    }

    let n_fields = stations.len();
    let mut per_field_true: Vec<Vec<f64>> = vec![Vec::new(); n_fields];
    let mut per_field_pred: Vec<Vec<f64>> = vec![Vec::new(); n_fields];

    for (truth, pred) in y_true.iter().zip(y_pred) {
        if truth.len() != pred.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "true window has {} steps but the prediction has {}",
                truth.len(),
                pred.len()
            )));
        }
        for (true_row, pred_row) in truth.iter().zip(pred) {
            if true_row.len() != n_fields || pred_row.len() != n_fields {
                return Err(ForecastError::SchemaMismatch(format!(
                    "rows carry {}/{} values for {} stations",
                    true_row.len(),
                    pred_row.len(),
                    n_fields
                )));
            }
            for i in 0..n_fields {
                per_field_true[i].push(true_row[i]);
                per_field_pred[i].push(pred_row[i]);
            }
        }
    }

    let mut fields = Vec::with_capacity(n_fields);
    let mut within_total = 0usize;
    let mut count_total = 0usize;
    for (i, name) in stations.iter().enumerate() {
        let truth = &per_field_true[i];
        let pred = &per_field_pred[i];
        fields.push((
            name.clone(),
            FieldMetrics {
                mse: mean_squared_error(truth, pred),
                mae: mean_absolute_error(truth, pred),
                r2: r2_score(truth, pred),
                precision_pct: tolerance_precision(truth, pred),
            },
        ));
        within_total += truth
            .iter()
            .zip(pred)
            .filter(|(a, p)| (*p - *a).abs() <= PRECISION_TOLERANCE * a.abs())
            .count();
        count_total += truth.len();
    }

    let overall_precision_pct = if count_total == 0 {
        f64::NAN
    } else {
        100.0 * within_total as f64 / count_total as f64
    };

    Ok(EvaluationReport {
        fields,
        overall_precision_pct,
    })
}

/// Evaluate a trained model over held-out normalized examples, denormalizing
/// both sides before scoring.
pub fn evaluate_model(
    model: &SequenceModel,
    scaler: &ScalerState,
    examples: &[WindowExample],
) -> Result<EvaluationReport> {
    if examples.is_empty() {
        return Err(ForecastError::EmptyInput(
            "no held-out examples to evaluate".to_string(),
        ));
    }

    let mut y_true = Vec::with_capacity(examples.len());
    let mut y_pred = Vec::with_capacity(examples.len());
    for example in examples {
        let predicted = model.predict(&example.input)?;
        y_pred.push(scaler.inverse(&predicted)?);
        y_true.push(scaler.inverse(&example.target)?);
    }

    evaluate(&y_true, &y_pred, scaler.columns())
}
