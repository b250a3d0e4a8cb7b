use assert_approx_eq::assert_approx_eq;
use river_forecast::error::ForecastError;
use river_forecast::metrics::{
    evaluate, mean_absolute_error, mean_squared_error, r2_score, tolerance_precision,
};

#[test]
fn test_regression_metrics() {
    let actual: Vec<f64> = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    let predicted: Vec<f64> = vec![12.0, 18.0, 33.0, 37.0, 52.0];

    let mae = mean_absolute_error(&actual, &predicted);
    assert_approx_eq!(mae, 2.4, 0.01);

    let mse = mean_squared_error(&actual, &predicted);
    assert_approx_eq!(mse, 6.0, 0.01);

    let r2 = r2_score(&actual, &predicted);
    assert!(r2 > 0.9 && r2 < 1.0);
}

#[test]
fn test_metrics_on_empty_or_mismatched_slices_are_nan() {
    let empty: Vec<f64> = vec![];
    let actual = vec![1.0, 2.0];

    assert!(mean_absolute_error(&empty, &actual).is_nan());
    assert!(mean_squared_error(&actual, &vec![1.0]).is_nan());
    assert!(r2_score(&empty, &empty).is_nan());
    assert!(tolerance_precision(&empty, &empty).is_nan());
}

#[test]
fn test_perfect_prediction_metrics() {
    let values: Vec<f64> = vec![3.0, 4.0, 5.0];
    assert_approx_eq!(mean_absolute_error(&values, &values), 0.0);
    assert_approx_eq!(mean_squared_error(&values, &values), 0.0);
    assert_approx_eq!(r2_score(&values, &values), 1.0);
    assert_approx_eq!(tolerance_precision(&values, &values), 100.0);
}

#[test]
fn test_tolerance_precision_counts_the_five_percent_band() {
    let actual = vec![100.0, 100.0, 100.0, 100.0];
    // 4%, exactly 5%, 6%, and 50% off: the first two are within tolerance.
    let predicted = vec![104.0, 105.0, 106.0, 150.0];

    assert_approx_eq!(tolerance_precision(&actual, &predicted), 50.0);
}

#[test]
fn test_tolerance_precision_at_zero_requires_exact_zero() {
    let actual = vec![0.0, 0.0];
    let predicted = vec![0.0, 0.001];
    assert_approx_eq!(tolerance_precision(&actual, &predicted), 50.0);
}

#[test]
fn test_constant_truth_r2_policy() {
    let actual = vec![5.0, 5.0, 5.0];
    assert_approx_eq!(r2_score(&actual, &actual), 1.0);
    assert_approx_eq!(r2_score(&actual, &vec![5.0, 5.1, 5.0]), 0.0);
}

#[test]
fn test_evaluate_reports_per_station_and_overall_precision() {
    let stations = vec!["ayacucho".to_string(), "palua".to_string()];
    // Two examples of two horizon steps each.
    let y_true = vec![
        vec![vec![100.0, 200.0], vec![110.0, 210.0]],
        vec![vec![120.0, 220.0], vec![130.0, 230.0]],
    ];
    // ayacucho predictions all within 2%; palua misses everywhere by >5%.
    let y_pred = vec![
        vec![vec![102.0, 250.0], vec![112.0, 260.0]],
        vec![vec![118.0, 270.0], vec![132.0, 280.0]],
    ];

    let report = evaluate(&y_true, &y_pred, &stations).unwrap();
    assert_eq!(report.fields.len(), 2);

    let (name, ayacucho) = &report.fields[0];
    assert_eq!(name, "ayacucho");
    assert_approx_eq!(ayacucho.precision_pct, 100.0);
    assert_approx_eq!(ayacucho.mae, 2.0, 0.01);

    let (name, palua) = &report.fields[1];
    assert_eq!(name, "palua");
    assert_approx_eq!(palua.precision_pct, 0.0);

    // 4 of 8 predictions within tolerance overall.
    assert_approx_eq!(report.overall_precision_pct, 50.0);

    let rendered = report.to_string();
    assert!(rendered.contains("Metrics for ayacucho"));
    assert!(rendered.contains("Overall Precision"));
}

#[test]
fn test_evaluate_within_tolerance_everywhere_is_full_precision() {
    let stations = vec!["caicara".to_string()];
    let y_true = vec![vec![vec![100.0], vec![200.0]], vec![vec![300.0], vec![400.0]]];
    let y_pred = vec![vec![vec![101.0], vec![204.0]], vec![vec![297.0], vec![392.0]]];

    let report = evaluate(&y_true, &y_pred, &stations).unwrap();
    assert_approx_eq!(report.fields[0].1.precision_pct, 100.0);
    assert_approx_eq!(report.overall_precision_pct, 100.0);
}

#[test]
fn test_evaluate_rejects_bad_shapes() {
    let stations = vec!["ayacucho".to_string()];

    let empty: Vec<Vec<Vec<f64>>> = vec![];
    assert!(matches!(
        evaluate(&empty, &empty, &stations),
        Err(ForecastError::EmptyInput(_))
    ));

    let y_true = vec![vec![vec![1.0]]];
    let y_pred = vec![vec![vec![1.0]], vec![vec![2.0]]];
    assert!(matches!(
        evaluate(&y_true, &y_pred, &stations),
        Err(ForecastError::SchemaMismatch(_))
    ));

    let y_wide = vec![vec![vec![1.0, 2.0]]];
    assert!(matches!(
        evaluate(&y_true, &y_wide, &stations),
        Err(ForecastError::SchemaMismatch(_))
    ));
}
