/*!
A linear regressor over flattened windows, trained by mini-batch gradient descent
*/
use super::{ModelTrainer, PredictionModel};
use crate::data::FEATURES;
use crate::error::{Error, Result};
use crate::window::Window;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// The format tag written into persisted linear models
pub const LINEAR_FORMAT: &str = "linear-window";

/// The current persisted linear model version
pub const LINEAR_VERSION: u32 = 1;

/// The default step size, as a fraction of the largest stable step
pub const DEFAULT_STEP: f64 = 0.5;

/// A linear model over every value of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWindowModel {
    /// Always `LINEAR_FORMAT`
    pub format: String,
    /// The version this model was written with
    pub version: u32,
    /// The number of days per window
    pub window_size: usize,
    /// One weight per day and feature, day-major
    pub weights: Vec<f64>,
    /// The intercept
    pub bias: f64,
}

impl LinearWindowModel {
    /// A model predicting zero for every window
    pub fn zeros(window_size: usize) -> LinearWindowModel {
        LinearWindowModel {
            format: LINEAR_FORMAT.to_owned(),
            version: LINEAR_VERSION,
            window_size,
            weights: vec![0.0; window_size * FEATURES],
            bias: 0.0,
        }
    }
    /// Predict a single window
    pub fn predict_one(&self, window: &Window) -> Result<f64> {
        if window.len() != self.window_size {
            return Err(Error::Model(format!(
                "model takes windows of {} days, got {}",
                self.window_size,
                window.len()
            )));
        }
        Ok(flatten(window)
            .zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias)
    }
    /// Mean squared error over labelled windows
    pub fn mse(&self, x: &[Window], y: &[f64]) -> Result<f64> {
        let mut total = 0.0;
        for (window, label) in x.iter().zip(y.iter()) {
            let err = self.predict_one(window)? - label;
            total += err * err;
        }
        Ok(total / x.len().max(1) as f64)
    }
    /// Load a model from a file
    pub fn load(path: &Path) -> Result<LinearWindowModel> {
        let model: LinearWindowModel = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        if model.format != LINEAR_FORMAT || model.version > LINEAR_VERSION {
            return Err(Error::ArtifactFormat(format!(
                "unsupported model {:?} version {}",
                model.format, model.version
            )));
        }
        if model.weights.len() != model.window_size * FEATURES {
            return Err(Error::ArtifactFormat(format!(
                "model has {} weights for {}-day windows",
                model.weights.len(),
                model.window_size
            )));
        }
        Ok(model)
    }
}

fn flatten(window: &Window) -> impl Iterator<Item = f64> + '_ {
    window.iter().flat_map(|day| day.iter().copied())
}

impl PredictionModel for LinearWindowModel {
    fn predict(&self, windows: &[Window]) -> Result<Vec<f64>> {
        windows.iter().map(|window| self.predict_one(window)).collect()
    }
    fn save(&self, path: &Path) -> Result<()> {
        let mut wtr = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut wtr, self)?;
        wtr.flush()?;
        Ok(())
    }
}

/// Trains `LinearWindowModel`s.
///
/// The step is `step / max(1 + |x|^2)` over the training windows, which keeps full-batch descent
/// monotone for any `step` below one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearTrainer {
    /// The step size, as a fraction of the largest stable step
    pub step: f64,
    /// Whether to draw a progress bar
    pub progress: bool,
}

impl Default for LinearTrainer {
    fn default() -> Self {
        LinearTrainer {
            step: DEFAULT_STEP,
            progress: false,
        }
    }
}

impl ModelTrainer for LinearTrainer {
    type Model = LinearWindowModel;

    fn train(
        &self,
        x: &[Window],
        y: &[f64],
        epochs: usize,
        batch_size: usize,
    ) -> Result<LinearWindowModel> {
        if x.is_empty() || x.len() != y.len() {
            return Err(Error::InvalidParameter(format!(
                "cannot train on {} windows with {} labels",
                x.len(),
                y.len()
            )));
        }
        let window_size = x[0].len();
        if x.iter().any(|window| window.len() != window_size) {
            return Err(Error::InvalidParameter("windows differ in length".to_owned()));
        }
        let batch_size = batch_size.max(1);
        let max_norm = x
            .iter()
            .map(|window| 1.0 + flatten(window).map(|v| v * v).sum::<f64>())
            .fold(1.0, f64::max);
        let step = self.step / max_norm;

        let mut model = LinearWindowModel::zeros(window_size);
        let bar = if self.progress {
            let bar = ProgressBar::new(epochs as u64);
            bar.set_style(
                ProgressStyle::default_bar().template("[{msg:<15}] {wide_bar} {pos:>4}/{len:4}"),
            );
            bar.set_message("no loss");
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut grad = vec![0.0; model.weights.len()];
        for epoch in 0..epochs {
            for (xs, ys) in x.chunks(batch_size).zip(y.chunks(batch_size)) {
                grad.iter_mut().for_each(|g| *g = 0.0);
                let mut grad_bias = 0.0;
                for (window, label) in xs.iter().zip(ys.iter()) {
                    let err = model.predict_one(window)? - label;
                    for (g, v) in grad.iter_mut().zip(flatten(window)) {
                        *g += err * v;
                    }
                    grad_bias += err;
                }
                let scale = 2.0 * step / xs.len() as f64;
                for (w, g) in model.weights.iter_mut().zip(grad.iter()) {
                    *w -= scale * g;
                }
                model.bias -= scale * grad_bias;
            }
            let loss = model.mse(x, y)?;
            debug!(epoch, loss, "finished epoch");
            bar.set_message(&format!("loss = {:.5}", loss));
            bar.inc(1);
        }
        bar.finish_and_clear();
        info!(
            windows = x.len(),
            epochs,
            loss = model.mse(x, y)?,
            "trained linear window model"
        );
        Ok(model)
    }
}
