use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use river_forecast::data::{InputTable, TableSchema};
use river_forecast::error::{ForecastError, Result};
use river_forecast::models::{FitHistory, FitOptions, InputWindow, Regressor, SequenceModel};
use river_forecast::scaler::MinMaxScaler;
use river_forecast::serve::{into_response, PredictionService, ServiceConfig};
use std::path::Path;

const STATIONS: [&str; 4] = ["ayacucho", "caicara", "ciudad_bolivar", "palua"];

/// Capability that always predicts the normalized mid-range value
#[derive(Debug)]
struct MidRangeRegressor {
    seq_len: usize,
    n_fields: usize,
    horizon: usize,
}

impl Regressor for MidRangeRegressor {
    fn input_shape(&self) -> (usize, usize) {
        (self.seq_len, self.n_fields)
    }

    fn output_len(&self) -> usize {
        self.horizon * self.n_fields
    }

    fn fit(
        &mut self,
        _x: &[InputWindow],
        _y: &[Vec<f64>],
        _validation: Option<(&[InputWindow], &[Vec<f64>])>,
        _opts: &FitOptions,
    ) -> Result<FitHistory> {
        Ok(FitHistory::default())
    }

    fn predict(&self, _input: &InputWindow) -> Result<Vec<f64>> {
        Ok(vec![0.5; self.output_len()])
    }

    fn save(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Scaler fitted so station i spans [0, 2 * (i + 1)]: the mid-range
/// prediction denormalizes to i + 1 for station i.
fn service() -> PredictionService {
    let columns: Vec<String> = STATIONS.iter().map(|s| s.to_string()).collect();
    let low: Vec<f64> = vec![0.0; 4];
    let high: Vec<f64> = (1..=4).map(|i| 2.0 * i as f64).collect();
    let scaler = MinMaxScaler::fit(&columns, &[low, high]).unwrap();

    let model = SequenceModel::from_regressor(MidRangeRegressor {
        seq_len: 31,
        n_fields: 4,
        horizon: 7,
    })
    .unwrap();

    PredictionService::new(model, scaler, ServiceConfig::default()).unwrap()
}

fn csv_table(rows: usize, with_dates: bool) -> String {
    let mut body = String::new();
    if with_dates {
        body.push_str("fecha,");
    }
    body.push_str(&STATIONS.join(","));
    body.push('\n');
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    for i in 0..rows {
        if with_dates {
            body.push_str(&format!("{},", start + chrono::Duration::days(i as i64)));
        }
        body.push_str("1.0,2.0,3.0,4.0\n");
    }
    body
}

fn parse(body: &str) -> InputTable {
    InputTable::parse_csv(body.as_bytes(), &TableSchema::default()).unwrap()
}

#[test]
fn test_predict_once_returns_seven_dated_records() {
    let service = service();
    let table = parse(&csv_table(31, true));

    let response = service.predict_once(&table).unwrap();
    assert_eq!(response.prediction.len(), 7);

    // Input dates run 2023-01-01..2023-01-31, so forecasts start Feb 1.
    let mut expected = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap();
    for (i, record) in response.prediction.iter().enumerate() {
        assert_eq!(record.date, Some(expected));
        expected = expected.succ_opt().unwrap();

        assert_eq!(record.levels.len(), 4);
        for (station_index, station) in STATIONS.iter().enumerate() {
            let level = record.levels[*station];
            assert_eq!(level, (station_index + 1) as f64, "record {}", i);
        }
    }
}

#[test]
fn test_predict_once_serializes_to_the_wire_shape() {
    let service = service();
    let table = parse(&csv_table(31, true));

    let value = into_response(service.predict_once(&table));
    let days = value["7_day_prediction"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert_eq!(days[0]["ayacucho"], 1.0);
    assert_eq!(days[0]["date"], "2023-02-01");
    assert_eq!(days[6]["date"], "2023-02-07");
}

#[test]
fn test_predict_once_without_dates_omits_the_date_field() {
    let service = service();
    let table = parse(&csv_table(31, false));

    let response = service.predict_once(&table).unwrap();
    assert!(response.prediction.iter().all(|r| r.date.is_none()));

    let value = into_response(Ok(response));
    assert!(value["7_day_prediction"][0].get("date").is_none());
}

#[test]
fn test_predict_once_uses_the_last_parseable_date() {
    let service = service();
    let mut body = csv_table(30, true);
    body.push_str("garbled,1.0,2.0,3.0,4.0\n");
    let table = parse(&body);

    let response = service.predict_once(&table).unwrap();
    // Last valid date is row 29 (2023-01-30), so forecasts start Jan 31.
    assert_eq!(
        response.prediction[0].date,
        Some(NaiveDate::from_ymd_opt(2023, 1, 31).unwrap())
    );
}

#[test]
fn test_predict_once_rejects_wrong_row_count() {
    let service = service();

    let err = service.predict_once(&parse(&csv_table(30, true))).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));
    assert!(err.to_string().contains("31"), "message was: {}", err);

    let err = service.predict_once(&parse(&csv_table(32, true))).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));
}

#[test]
fn test_predict_once_rejects_missing_column() {
    let service = service();
    let mut body = String::from("fecha,ayacucho,caicara,ciudad_bolivar\n");
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    for i in 0..31 {
        body.push_str(&format!(
            "{},1.0,2.0,3.0\n",
            start + chrono::Duration::days(i)
        ));
    }

    let err = service.predict_once(&parse(&body)).unwrap_err();
    assert!(matches!(err, ForecastError::SchemaMismatch(_)));
    assert!(err.to_string().contains("palua"), "message was: {}", err);
}

#[test]
fn test_predict_once_rejects_unexpected_column() {
    let service = service();
    let mut body = String::from("ayacucho,caicara,ciudad_bolivar,palua,turbidity\n");
    for _ in 0..31 {
        body.push_str("1.0,2.0,3.0,4.0,9.9\n");
    }

    let err = service.predict_once(&parse(&body)).unwrap_err();
    assert!(matches!(err, ForecastError::SchemaMismatch(_)));
    assert!(err.to_string().contains("turbidity"), "message was: {}", err);
}

#[test]
fn test_predict_once_accepts_any_column_order() {
    let service = service();
    let mut body = String::from("palua,ciudad_bolivar,caicara,ayacucho\n");
    for _ in 0..31 {
        body.push_str("4.0,3.0,2.0,1.0\n");
    }

    let response = service.predict_once(&parse(&body)).unwrap();
    // Output is keyed by station name, independent of input column order.
    assert_eq!(response.prediction[0].levels["ayacucho"], 1.0);
    assert_eq!(response.prediction[0].levels["palua"], 4.0);
}

#[test]
fn test_predict_once_rejects_non_numeric_and_empty_cells() {
    let service = service();

    let mut body = csv_table(30, false);
    body.push_str("1.0,high,3.0,4.0\n");
    let err = service.predict_once(&parse(&body)).unwrap_err();
    assert!(matches!(err, ForecastError::DataQuality(_)));
    let message = err.to_string();
    assert!(message.contains("caicara"), "message was: {}", message);
    assert!(message.contains("high"), "message was: {}", message);

    let mut body = csv_table(30, false);
    body.push_str("1.0,,3.0,4.0\n");
    let err = service.predict_once(&parse(&body)).unwrap_err();
    assert!(matches!(err, ForecastError::DataQuality(_)));
    assert!(err.to_string().contains("row 30"), "message was: {}", err);
}

#[test]
fn test_predict_trend_tags_every_offset_in_order() {
    let service = service();
    let table = parse(&csv_table(36, true));

    let response = service.predict_trend(&table).unwrap();
    assert_eq!(response.trend.len(), 6);
    for (i, point) in response.trend.iter().enumerate() {
        assert_eq!(point.window_start_row, i);
        assert_eq!(point.prediction.len(), 7);
    }

    // Window 0 covers rows 0..31 (last date Jan 31); window 5 rows 5..36.
    assert_eq!(
        response.trend[0].prediction[0].date,
        Some(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap())
    );
    assert_eq!(
        response.trend[5].prediction[0].date,
        Some(NaiveDate::from_ymd_opt(2023, 2, 6).unwrap())
    );
}

#[test]
fn test_predict_trend_on_exact_length_buffer() {
    let service = service();
    let response = service.predict_trend(&parse(&csv_table(31, false))).unwrap();
    assert_eq!(response.trend.len(), 1);
    assert_eq!(response.trend[0].window_start_row, 0);
}

#[test]
fn test_predict_trend_rejects_short_buffers() {
    let service = service();
    let err = service.predict_trend(&parse(&csv_table(30, true))).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));
    assert!(err.to_string().contains("at least 31"), "message was: {}", err);
}

#[test]
fn test_trend_serializes_to_the_wire_shape() {
    let service = service();
    let value = into_response(service.predict_trend(&parse(&csv_table(33, false))));

    let trend = value["trend"].as_array().unwrap();
    assert_eq!(trend.len(), 3);
    assert_eq!(trend[2]["window_start_row"], 2);
    assert!(trend[2]["7_day_prediction"].is_array());
}

#[test]
fn test_into_response_translates_errors() {
    let service = service();
    let value = into_response(service.predict_once(&parse(&csv_table(5, true))));

    let message = value["error"].as_str().unwrap();
    assert!(message.contains("31"), "message was: {}", message);
}

#[test]
fn test_service_rejects_mismatched_artifacts() {
    let columns: Vec<String> = STATIONS.iter().map(|s| s.to_string()).collect();
    let scaler = MinMaxScaler::fit(&columns, &[vec![0.0; 4], vec![1.0; 4]]).unwrap();

    // Model trained for 3 stations against a 4-station scaler.
    let model = SequenceModel::from_regressor(MidRangeRegressor {
        seq_len: 31,
        n_fields: 3,
        horizon: 7,
    })
    .unwrap();
    let result = PredictionService::new(model, scaler.clone(), ServiceConfig::default());
    assert!(matches!(result, Err(ForecastError::ArtifactLoad(_))));

    // Configured stations disagree with the fitted columns.
    let model = SequenceModel::from_regressor(MidRangeRegressor {
        seq_len: 31,
        n_fields: 4,
        horizon: 7,
    })
    .unwrap();
    let config = ServiceConfig {
        schema: TableSchema {
            stations: vec!["somewhere_else".to_string(); 4],
            ..TableSchema::default()
        },
        ..ServiceConfig::default()
    };
    let result = PredictionService::new(model, scaler, config);
    assert!(matches!(result, Err(ForecastError::ArtifactLoad(_))));
}
