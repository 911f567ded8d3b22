/*!
Sliding-window datasets over aligned daily rows

A window is `window_size` consecutive days of scaled features; its label is the scaled closing
price of the day right after it. Splits are chronological and scalers only ever see the
training partition.
*/
use crate::data::scale::MinMaxScaler;
use crate::data::{AlignedRow, FeatureVector, FEATURES, TARGET_FEATURE};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The default number of days in a window
pub const DEFAULT_WINDOW_SIZE: usize = 60;

/// The default fraction of rows used for training
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// A window of consecutive days of features
pub type Window = Vec<FeatureVector>;

/// Everything needed to train and evaluate a model on one asset
#[derive(Debug, Clone)]
pub struct TrainingSet {
    /// The feature scaler, fit on the training rows
    pub feature_scaler: MinMaxScaler,
    /// The target scaler, fit on the training rows' closing prices
    pub target_scaler: MinMaxScaler,
    /// Training windows
    pub x_train: Vec<Window>,
    /// Scaled training labels
    pub y_train: Vec<f64>,
    /// Test windows, the first reaching `window_size` rows back into the training rows
    pub x_test: Vec<Window>,
    /// Raw closing prices the test windows should predict
    pub y_test: Vec<f64>,
    /// The dates of `y_test`
    pub test_dates: Vec<NaiveDate>,
    /// The most recent window, for forecasting the day after the data ends
    pub next_window: Window,
    /// The number of rows in the training partition
    pub train_size: usize,
}

/// The size of the training partition: `floor(len * train_fraction)`
pub fn train_size(len: usize, train_fraction: f64) -> usize {
    (len as f64 * train_fraction).floor() as usize
}

/// Windows ending just before each index in `labels`.
///
/// Every label needs `window_size` rows before it, and `labels` must lie within `series`.
pub fn windows(
    series: &[FeatureVector],
    window_size: usize,
    labels: Range<usize>,
) -> Result<Vec<Window>> {
    if labels.start < labels.end && (labels.start < window_size || labels.end > series.len()) {
        return Err(Error::InvalidParameter(format!(
            "labels {:?} need {}-day windows within {} rows",
            labels,
            window_size,
            series.len()
        )));
    }
    Ok(labels
        .map(|end| series[end - window_size..end].to_vec())
        .collect())
}

/// Scale the last `window_size` rows of a series into a single window
pub fn scale_window(
    series: &[FeatureVector],
    scaler: &MinMaxScaler,
    window_size: usize,
) -> Result<Window> {
    if series.len() < window_size {
        return Err(Error::InsufficientData {
            required: window_size,
            obtained: series.len(),
        });
    }
    series[series.len() - window_size..]
        .iter()
        .map(|row| {
            let mut row = *row;
            scaler.transform_in_place(&mut row)?;
            Ok(row)
        })
        .collect()
}

/// Split aligned rows chronologically, fit scalers on the training partition and cut windows
pub fn build_train_windows(
    rows: &[AlignedRow],
    window_size: usize,
    train_fraction: f64,
) -> Result<TrainingSet> {
    if window_size == 0 {
        return Err(Error::InvalidParameter("window size must be positive".to_owned()));
    }
    if !(train_fraction > 0.0 && train_fraction <= 1.0) {
        return Err(Error::InvalidParameter(format!(
            "train fraction {} is not in (0, 1]",
            train_fraction
        )));
    }
    let len = rows.len();
    let train_size = train_size(len, train_fraction);
    if train_size <= window_size {
        return Err(Error::InsufficientData {
            required: window_size + 1,
            obtained: train_size,
        });
    }

    let features: Vec<FeatureVector> = rows.iter().map(AlignedRow::features).collect();
    let closes: Vec<f64> = features.iter().map(|row| row[TARGET_FEATURE]).collect();
    let feature_scaler: MinMaxScaler = MinMaxScaler::fit(&features[..train_size], FEATURES);
    let target_scaler = MinMaxScaler::fit_column(&closes[..train_size]);

    let mut scaled = features;
    for row in scaled.iter_mut() {
        feature_scaler.transform_in_place(row)?;
    }
    let scaled_closes: Vec<f64> = closes
        .iter()
        .map(|close| target_scaler.scale_value(0, *close))
        .collect();

    Ok(TrainingSet {
        x_train: windows(&scaled, window_size, window_size..train_size)?,
        y_train: scaled_closes[window_size..train_size].to_vec(),
        x_test: windows(&scaled, window_size, train_size..len)?,
        y_test: closes[train_size..].to_vec(),
        test_dates: rows[train_size..].iter().map(AlignedRow::date).collect(),
        next_window: scaled[len - window_size..].to_vec(),
        feature_scaler,
        target_scaler,
        train_size,
    })
}

/// Error metrics of a forecast against actual values
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Mean absolute percentage error, in percent
    pub mape: f64,
}

/// Compare predictions with actual values. Returns `None` if there is nothing to compare.
pub fn evaluate(predictions: &[f64], actuals: &[f64]) -> Option<ForecastMetrics> {
    let n = predictions.len().min(actuals.len());
    if n == 0 {
        return None;
    }
    let pairs = || predictions.iter().zip(actuals.iter()).take(n);
    let count = n as f64;
    let mse = pairs().map(|(p, a)| (p - a) * (p - a)).sum::<f64>() / count;
    let mae = pairs().map(|(p, a)| (p - a).abs()).sum::<f64>() / count;
    let mape = pairs()
        .map(|(p, a)| ((p - a) / a).abs())
        .sum::<f64>()
        / count
        * 100.0;
    Some(ForecastMetrics {
        rmse: mse.sqrt(),
        mae,
        mape,
    })
}
