//! Station time series loading and request-table parsing

use crate::error::{ForecastError, Result};
use crate::utils::forward_fill;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Expected table layout: the station columns the pipeline is fitted on and
/// the recognized names for the optional date column.
///
/// Date columns are matched by case-insensitive equality against
/// `date_aliases`; there is no substring guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Station (feature) column names
    pub stations: Vec<String>,
    /// Recognized date column names
    pub date_aliases: Vec<String>,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            stations: vec![
                "ayacucho".to_string(),
                "caicara".to_string(),
                "ciudad_bolivar".to_string(),
                "palua".to_string(),
            ],
            date_aliases: vec!["fecha".to_string(), "date".to_string()],
        }
    }
}

impl TableSchema {
    /// Whether a column name is one of the configured date-column aliases
    pub fn is_date_column(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.date_aliases.iter().any(|alias| alias.to_lowercase() == lower)
    }
}

/// Cleaned, chronologically ordered multivariate river-level series
#[derive(Debug, Clone, PartialEq)]
pub struct RiverSeries {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    dates: Option<Vec<NaiveDate>>,
}

/// Data loader for historical river-level tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a historical series from a CSV file.
    ///
    /// Rows with an unparseable date are dropped, the remainder is sorted
    /// chronologically, and missing station cells are forward-filled.
    pub fn from_csv<P: AsRef<Path>>(path: P, schema: &TableSchema) -> Result<RiverSeries> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df, schema)
    }

    /// Build a cleaned series from an existing DataFrame
    pub fn from_dataframe(df: DataFrame, schema: &TableSchema) -> Result<RiverSeries> {
        let column_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let date_column = column_names
            .iter()
            .find(|name| schema.is_date_column(name))
            .cloned();

        let dates = match &date_column {
            Some(name) => Some(column_as_dates(&df, name)?),
            None => None,
        };

        let station_names: Vec<String> = column_names
            .into_iter()
            .filter(|name| Some(name) != date_column.as_ref())
            .collect();
        if station_names.is_empty() {
            return Err(ForecastError::SchemaMismatch(
                "table has no station columns".to_string(),
            ));
        }

        let mut station_cells: Vec<Vec<Option<f64>>> = station_names
            .iter()
            .map(|name| column_as_opt_f64(&df, name))
            .collect::<Result<_>>()?;

        // Drop rows without a valid date and order the rest chronologically.
        if let Some(parsed) = &dates {
            let mut order: Vec<usize> = (0..parsed.len())
                .filter(|&i| parsed[i].is_some())
                .collect();
            order.sort_by_key(|&i| parsed[i]);

            for cells in &mut station_cells {
                let reordered: Vec<Option<f64>> = order.iter().map(|&i| cells[i]).collect();
                *cells = reordered;
            }
            let sorted_dates: Vec<NaiveDate> =
                order.iter().filter_map(|&i| parsed[i]).collect();
            return Self::assemble(station_names, station_cells, Some(sorted_dates));
        }

        Self::assemble(station_names, station_cells, None)
    }

    fn assemble(
        columns: Vec<String>,
        mut station_cells: Vec<Vec<Option<f64>>>,
        dates: Option<Vec<NaiveDate>>,
    ) -> Result<RiverSeries> {
        for (name, cells) in columns.iter().zip(&mut station_cells) {
            match forward_fill(cells) {
                None => {
                    return Err(ForecastError::DataQuality(format!(
                        "column '{}' has no numeric values",
                        name
                    )))
                }
                Some(first) if first > 0 => {
                    return Err(ForecastError::DataQuality(format!(
                        "column '{}' is missing its first {} value(s), nothing to forward-fill from",
                        name, first
                    )))
                }
                Some(_) => {}
            }
        }

        let height = station_cells.first().map(|cells| cells.len()).unwrap_or(0);
        let mut rows = Vec::with_capacity(height);
        for i in 0..height {
            let row: Vec<f64> = station_cells
                .iter()
                .map(|cells| cells[i].unwrap_or(f64::NAN))
                .collect();
            rows.push(row);
        }

        Ok(RiverSeries {
            columns,
            rows,
            dates,
        })
    }
}

impl RiverSeries {
    /// Build a series directly from station names and rows (mainly for tests)
    pub fn from_parts(
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
        dates: Option<Vec<NaiveDate>>,
    ) -> Result<Self> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(ForecastError::SchemaMismatch(format!(
                    "row has {} values but there are {} station columns",
                    row.len(),
                    columns.len()
                )));
            }
        }
        if let Some(parsed) = &dates {
            if parsed.len() != rows.len() {
                return Err(ForecastError::SchemaMismatch(format!(
                    "{} dates for {} rows",
                    parsed.len(),
                    rows.len()
                )));
            }
        }
        Ok(Self {
            columns,
            rows,
            dates,
        })
    }

    /// Station column names, in table order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Readings, one row per day
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Parsed per-row dates, when the table had a date column
    pub fn dates(&self) -> Option<&[NaiveDate]> {
        self.dates.as_deref()
    }

    /// Get the length of the series
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A raw prediction-request table: station cells kept as text so validation
/// can name the exact offending cell, plus the coerce-parsed date column.
#[derive(Debug, Clone)]
pub struct InputTable {
    columns: Vec<String>,
    cells: Vec<Vec<String>>,
    dates: Vec<Option<NaiveDate>>,
    date_column: Option<String>,
}

impl InputTable {
    /// Parse a CSV request body.
    ///
    /// The date column (if any) is split off and parsed leniently; every
    /// other column is kept verbatim for the service-side checks.
    pub fn parse_csv<R: Read>(reader: R, schema: &TableSchema) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let date_index = headers
            .iter()
            .position(|name| schema.is_date_column(name));
        let date_column = date_index.map(|i| headers[i].to_string());

        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != date_index)
            .map(|(_, name)| name.to_string())
            .collect();

        let mut cells = Vec::new();
        let mut dates = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let row: Vec<String> = record
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != date_index)
                .map(|(_, value)| value.to_string())
                .collect();
            cells.push(row);
            dates.push(date_index.and_then(|i| record.get(i)).and_then(parse_date));
        }

        Ok(Self {
            columns,
            cells,
            dates,
            date_column,
        })
    }

    /// Station column names, in file order (date column excluded)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw station cells for one row
    pub fn row(&self, index: usize) -> &[String] {
        &self.cells[index]
    }

    /// Number of data rows
    pub fn n_rows(&self) -> usize {
        self.cells.len()
    }

    /// Whether the table carried a recognized date column
    pub fn date_column(&self) -> Option<&str> {
        self.date_column.as_deref()
    }

    /// Last successfully parsed date among rows `[from, upto)`
    pub fn last_valid_date(&self, from: usize, upto: usize) -> Option<NaiveDate> {
        let upto = upto.min(self.dates.len());
        if from >= upto {
            return None;
        }
        self.dates[from..upto].iter().rev().find_map(|date| *date)
    }
}

/// Lenient date parsing: unparseable values become `None` rather than errors
fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
}

/// Extract a column as per-row optional readings
fn column_as_opt_f64(df: &DataFrame, column_name: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(column_name).map_err(|e| {
        ForecastError::DataQuality(format!("column '{}' not found: {}", column_name, e))
    })?;

    match col.dtype() {
        DataType::Float64 => Ok(col.f64().unwrap().into_iter().collect()),
        DataType::Float32 => Ok(col
            .f32()
            .unwrap()
            .into_iter()
            .map(|v| v.map(|x| x as f64))
            .collect()),
        DataType::Int64 => Ok(col
            .i64()
            .unwrap()
            .into_iter()
            .map(|v| v.map(|x| x as f64))
            .collect()),
        DataType::Int32 => Ok(col
            .i32()
            .unwrap()
            .into_iter()
            .map(|v| v.map(|x| x as f64))
            .collect()),
        DataType::UInt64 => Ok(col
            .u64()
            .unwrap()
            .into_iter()
            .map(|v| v.map(|x| x as f64))
            .collect()),
        DataType::UInt32 => Ok(col
            .u32()
            .unwrap()
            .into_iter()
            .map(|v| v.map(|x| x as f64))
            .collect()),
        _ => Err(ForecastError::DataQuality(format!(
            "column '{}' is not numeric",
            column_name
        ))),
    }
}

/// Extract a date column, coercing unparseable entries to `None`
fn column_as_dates(df: &DataFrame, column_name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let col = df.column(column_name)?;

    match col.dtype() {
        DataType::Utf8 => Ok(col
            .utf8()
            .unwrap()
            .into_iter()
            .map(|v| v.and_then(parse_date))
            .collect()),
        DataType::Date => Ok(col
            .date()
            .unwrap()
            .into_iter()
            .map(|v| {
                v.and_then(|days| {
                    NaiveDate::from_ymd_opt(1970, 1, 1)
                        .unwrap()
                        .checked_add_days(chrono::Days::new(days.max(0) as u64))
                })
            })
            .collect()),
        DataType::Datetime(_, _) => Ok(col
            .datetime()
            .unwrap()
            .into_iter()
            .map(|v| {
                v.and_then(|ts| {
                    NaiveDateTime::from_timestamp_opt(
                        ts / 1_000_000_000,
                        (ts % 1_000_000_000) as u32,
                    )
                })
                .map(|dt| dt.date())
            })
            .collect()),
        _ => Err(ForecastError::DataQuality(format!(
            "column '{}' cannot be read as dates",
            column_name
        ))),
    }
}
