//! Sliding-window example construction and chronological splitting

use crate::error::{ForecastError, Result};

/// One training pair: `input` holds the sequence-length rows fed to the
/// model, `target` the horizon rows that immediately follow.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowExample {
    pub input: Vec<Vec<f64>>,
    pub target: Vec<Vec<f64>>,
}

/// Slice a chronological series into (input, target) window pairs.
///
/// For every start `i` in `0..=len - seq_len - horizon` the input spans rows
/// `[i, i + seq_len)` and the target the `horizon` rows directly after it,
/// so a series of `N` rows yields exactly `N - seq_len - horizon + 1`
/// examples in chronological order.
pub fn make_windows(
    rows: &[Vec<f64>],
    seq_len: usize,
    horizon: usize,
) -> Result<Vec<WindowExample>> {
    if seq_len == 0 || horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "sequence length and horizon must be positive".to_string(),
        ));
    }
    if rows.len() < seq_len + horizon {
        return Err(ForecastError::InsufficientData(format!(
            "need at least {} rows to build windows (sequence length {} + horizon {}), got {}",
            seq_len + horizon,
            seq_len,
            horizon,
            rows.len()
        )));
    }

    let examples = (0..=rows.len() - seq_len - horizon)
        .map(|i| WindowExample {
            input: rows[i..i + seq_len].to_vec(),
            target: rows[i + seq_len..i + seq_len + horizon].to_vec(),
        })
        .collect();
    Ok(examples)
}

/// Input-only windows for inference over a longer buffer (the trend scan).
///
/// Every start `i` in `0..=len - seq_len` yields one window; there is no
/// target, so a buffer of exactly `seq_len` rows yields a single window.
pub fn sliding_inputs(rows: &[Vec<f64>], seq_len: usize) -> Result<Vec<&[Vec<f64>]>> {
    if seq_len == 0 {
        return Err(ForecastError::InvalidParameter(
            "sequence length must be positive".to_string(),
        ));
    }
    if rows.len() < seq_len {
        return Err(ForecastError::InsufficientData(format!(
            "need at least {} rows for one window, got {}",
            seq_len,
            rows.len()
        )));
    }

    Ok((0..=rows.len() - seq_len)
        .map(|i| &rows[i..i + seq_len])
        .collect())
}

/// Partition examples into chronological train/validation/test segments.
///
/// Train takes the first `floor(train_frac * N)` examples, validation the
/// next `floor(val_frac * N)`, and whatever remains goes to test. Order is
/// never changed; shuffling would leak future rows into training.
pub fn split<T>(
    examples: Vec<T>,
    train_frac: f64,
    val_frac: f64,
) -> Result<(Vec<T>, Vec<T>, Vec<T>)> {
    if train_frac < 0.0 || val_frac < 0.0 {
        return Err(ForecastError::InvalidFraction(format!(
            "fractions must be non-negative, got train={} val={}",
            train_frac, val_frac
        )));
    }
    if train_frac + val_frac > 1.0 {
        return Err(ForecastError::InvalidFraction(format!(
            "train + validation fractions exceed 1: {} + {}",
            train_frac, val_frac
        )));
    }

    let n = examples.len();
    let train_size = (train_frac * n as f64).floor() as usize;
    let val_size = (val_frac * n as f64).floor() as usize;

    let mut examples = examples;
    let test = examples.split_off(train_size + val_size);
    let val = examples.split_off(train_size);
    Ok((examples, val, test))
}
