use pretty_assertions::assert_eq;
use river_forecast::dataset::{make_windows, sliding_inputs, split};
use river_forecast::error::ForecastError;
use rstest::rstest;

fn series(len: usize) -> Vec<Vec<f64>> {
    (0..len).map(|i| vec![i as f64, i as f64 * 10.0]).collect()
}

#[rstest]
#[case(10, 3, 2, 6)]
#[case(5, 4, 1, 1)]
#[case(38, 31, 7, 1)]
#[case(100, 31, 7, 63)]
fn test_window_count(
    #[case] len: usize,
    #[case] seq_len: usize,
    #[case] horizon: usize,
    #[case] expected: usize,
) {
    let windows = make_windows(&series(len), seq_len, horizon).unwrap();
    assert_eq!(windows.len(), expected);
}

#[test]
fn test_windows_are_adjacent_and_chronological() {
    let rows = series(12);
    let windows = make_windows(&rows, 4, 3).unwrap();

    for (i, example) in windows.iter().enumerate() {
        assert_eq!(example.input.len(), 4);
        assert_eq!(example.target.len(), 3);
        // Input covers [i, i+4); target starts exactly one row later.
        assert_eq!(example.input[0], rows[i]);
        assert_eq!(example.input[3], rows[i + 3]);
        assert_eq!(example.target[0], rows[i + 4]);
        assert_eq!(example.target[2], rows[i + 6]);
    }
}

#[rstest]
#[case(9, 31, 7)]
#[case(37, 31, 7)]
#[case(4, 4, 1)]
fn test_too_short_series_is_insufficient(
    #[case] len: usize,
    #[case] seq_len: usize,
    #[case] horizon: usize,
) {
    let result = make_windows(&series(len), seq_len, horizon);
    assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
}

#[test]
fn test_insufficient_data_message_names_the_requirement() {
    let err = make_windows(&series(10), 31, 7).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("38"), "message was: {}", message);
    assert!(message.contains("10"), "message was: {}", message);
}

#[test]
fn test_sliding_inputs_cover_every_offset() {
    let rows = series(36);
    let inputs = sliding_inputs(&rows, 31).unwrap();

    assert_eq!(inputs.len(), 6);
    for (i, window) in inputs.iter().enumerate() {
        assert_eq!(window.len(), 31);
        assert_eq!(window[0], rows[i]);
        assert_eq!(window[30], rows[i + 30]);
    }
}

#[test]
fn test_sliding_inputs_on_exact_length_buffer() {
    let rows = series(31);
    let inputs = sliding_inputs(&rows, 31).unwrap();
    assert_eq!(inputs.len(), 1);

    let short = series(30);
    let result = sliding_inputs(&short, 31);
    assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
}

#[test]
fn test_split_is_chronological_with_remainder_to_test() {
    let examples: Vec<usize> = (0..100).collect();
    let (train, val, test) = split(examples, 0.6, 0.2).unwrap();

    assert_eq!(train.len(), 60);
    assert_eq!(val.len(), 20);
    assert_eq!(test.len(), 20);
    assert_eq!(train[59], 59);
    assert_eq!(val[0], 60);
    assert_eq!(test[0], 80);
    assert_eq!(test[19], 99);
}

#[test]
fn test_split_floors_fraction_sizes() {
    let examples: Vec<usize> = (0..7).collect();
    let (train, val, test) = split(examples, 0.6, 0.2).unwrap();

    // floor(0.6 * 7) = 4, floor(0.2 * 7) = 1, remainder 2
    assert_eq!(train, vec![0, 1, 2, 3]);
    assert_eq!(val, vec![4]);
    assert_eq!(test, vec![5, 6]);
}

#[rstest]
#[case(-0.1, 0.2)]
#[case(0.6, -0.2)]
#[case(0.8, 0.3)]
fn test_split_rejects_bad_fractions(#[case] train_frac: f64, #[case] val_frac: f64) {
    let result = split((0..10).collect::<Vec<usize>>(), train_frac, val_frac);
    assert!(matches!(result, Err(ForecastError::InvalidFraction(_))));
}

#[test]
fn test_split_allows_fractions_summing_to_one() {
    let (train, val, test) = split((0..10).collect::<Vec<usize>>(), 0.8, 0.2).unwrap();
    assert_eq!(train.len(), 8);
    assert_eq!(val.len(), 2);
    assert!(test.is_empty());
}
