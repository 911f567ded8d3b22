/*!
The prediction model contract and backend selection

Models map windows of scaled features to a scaled next-day close. Without the `torch` feature
the backend is a linear regressor over the flattened window; with it, the stacked LSTM in
`crate::lstm`.
*/
use crate::error::Result;
use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod linear;

pub use linear::{LinearTrainer, LinearWindowModel};

/// A trained sequence regressor
pub trait PredictionModel: Send + Sync {
    /// Predict the scaled target following each window
    fn predict(&self, windows: &[Window]) -> Result<Vec<f64>>;
    /// Persist this model to a file
    fn save(&self, path: &Path) -> Result<()>;
}

/// Something which fits a `PredictionModel` to labelled windows
pub trait ModelTrainer {
    /// The model produced
    type Model: PredictionModel + 'static;
    /// Fit a model on windows `x` with scaled labels `y`
    fn train(&self, x: &[Window], y: &[f64], epochs: usize, batch_size: usize)
        -> Result<Self::Model>;
}

/// Training hyperparameters
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Passes over the training windows
    pub epochs: usize,
    /// Windows per gradient step
    pub batch_size: usize,
    /// The optimizer's learning rate
    pub learning_rate: f64,
    /// Seed for weight initialization and batch shuffling
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        TrainingParams {
            epochs: 25,
            batch_size: 32,
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: 42,
        }
    }
}

/// The file name models are saved under within an asset's artifact directory
#[cfg(not(feature = "torch"))]
pub const MODEL_FILE: &str = "model.json";

/// The file name models are saved under within an asset's artifact directory
#[cfg(feature = "torch")]
pub const MODEL_FILE: &str = "model.ot";

/// The default learning rate of the active backend
#[cfg(not(feature = "torch"))]
pub const DEFAULT_LEARNING_RATE: f64 = linear::DEFAULT_STEP;

/// The default learning rate of the active backend
#[cfg(feature = "torch")]
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;

/// The trainer of the active backend
#[cfg(not(feature = "torch"))]
pub type DefaultTrainer = LinearTrainer;

/// The trainer of the active backend
#[cfg(feature = "torch")]
pub type DefaultTrainer = crate::lstm::StockLstmDesc;

/// Create the active backend's trainer
#[cfg(not(feature = "torch"))]
pub fn default_trainer(params: &TrainingParams, progress: bool) -> DefaultTrainer {
    LinearTrainer {
        step: params.learning_rate,
        progress,
    }
}

/// Create the active backend's trainer
#[cfg(feature = "torch")]
pub fn default_trainer(params: &TrainingParams, progress: bool) -> DefaultTrainer {
    crate::lstm::StockLstmDesc {
        learning_rate: params.learning_rate,
        seed: params.seed,
        progress,
        ..Default::default()
    }
}

/// Load a model saved by the active backend
#[cfg(not(feature = "torch"))]
pub fn load_model(path: &Path) -> Result<Box<dyn PredictionModel>> {
    Ok(Box::new(LinearWindowModel::load(path)?))
}

/// Load a model saved by the active backend
#[cfg(feature = "torch")]
pub fn load_model(path: &Path) -> Result<Box<dyn PredictionModel>> {
    Ok(Box::new(crate::lstm::StockLstm::load(path)?))
}
