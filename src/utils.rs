//! Utility functions for the river_forecast crate

use chrono::{Duration, NaiveDate};

/// Compute the calendar dates for a forecast horizon, starting the day
/// after the last observed date.
pub fn future_dates(last_date: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64)
        .map(|offset| last_date + Duration::days(offset))
        .collect()
}

/// Round a level reading to two decimals for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Forward-fill missing cells in a column, in place.
///
/// Returns the index of the first present value, or `None` if the column is
/// entirely missing. Cells before the first present value stay missing;
/// callers decide whether that is fatal.
pub fn forward_fill(column: &mut [Option<f64>]) -> Option<usize> {
    let first = column.iter().position(|cell| cell.is_some())?;
    let mut last = column[first];
    for cell in column.iter_mut().skip(first) {
        match cell {
            Some(value) => last = Some(*value),
            None => *cell = last,
        }
    }
    Some(first)
}
