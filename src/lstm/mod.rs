/*!
A stacked LSTM regressor on libtorch

Three LSTM layers of 50 units with dropout between them and after the last, and a linear head
on the final time step. Enabled with the `torch` feature.
*/

use crate::data::FEATURES;
use crate::error::{Error, Result};
use crate::model::{ModelTrainer, PredictionModel};
use crate::window::Window;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tch::nn::{self, Linear, Module, OptimizerConfig, RNNConfig, VarStore, LSTM, RNN};
use tch::{Device, Kind, Reduction, Tensor};
use tracing::{debug, info};

/// The stacked LSTM model
#[derive(Debug)]
pub struct StockLstm {
    /// The variables backing this model
    pub vs: VarStore,
    /// The number of days per window
    pub window_size: usize,
    /// This model's LSTM layers
    pub lstm_layer: LSTM,
    /// This model's linear layer
    pub linear_layer: Linear,
    /// The descriptor this model was built from
    pub desc: StockLstmDesc,
}

/// The shape of a saved model, written next to its weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LstmShape {
    window_size: usize,
    hidden: usize,
    layers: usize,
    dropout: f64,
}

fn shape_path(path: &Path) -> PathBuf {
    path.with_extension("shape.json")
}

/// A descriptor for an instance of the `StockLstm` model, doubling as its trainer
#[derive(Debug, Clone, PartialEq)]
pub struct StockLstmDesc {
    /// The size of the hidden LSTM layers to use
    pub hidden: usize,
    /// The number of hidden LSTM layers to use
    pub layers: usize,
    /// Dropout between and after the LSTM layers
    pub dropout: f64,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Seed for batch shuffling
    pub seed: u64,
    /// Whether to draw a progress bar
    pub progress: bool,
}

impl Default for StockLstmDesc {
    fn default() -> Self {
        StockLstmDesc {
            hidden: 50,
            layers: 3,
            dropout: 0.2,
            learning_rate: 1e-3,
            seed: 42,
            progress: false,
        }
    }
}

/// Pack windows into a `[batch, window, FEATURES]` tensor
fn pack(windows: &[Window]) -> Result<Tensor> {
    let window_size = windows.first().map(Vec::len).unwrap_or(0);
    if windows.iter().any(|window| window.len() != window_size) {
        return Err(Error::InvalidParameter("windows differ in length".to_owned()));
    }
    let mut input = Vec::<f32>::with_capacity(windows.len() * window_size * FEATURES);
    for window in windows {
        for day in window {
            input.extend(day.iter().map(|v| *v as f32));
        }
    }
    Ok(Tensor::from_slice(&input).view([
        windows.len() as i64,
        window_size as i64,
        FEATURES as i64,
    ]))
}

impl StockLstmDesc {
    /// Build a `StockLstm` over a fresh `VarStore`
    pub fn build(&self, window_size: usize, train: bool) -> StockLstm {
        let vs = VarStore::new(Device::cuda_if_available());
        let lstm_layer = nn::lstm(
            &vs.root(),
            FEATURES as i64,
            self.hidden as i64,
            RNNConfig {
                has_biases: true,
                num_layers: self.layers as i64,
                dropout: self.dropout,
                train,
                bidirectional: false,
                batch_first: true,
            },
        );
        let linear_layer = nn::linear(&vs.root(), self.hidden as i64, 1, Default::default());
        StockLstm {
            vs,
            window_size,
            lstm_layer,
            linear_layer,
            desc: self.clone(),
        }
    }
}

impl StockLstm {
    /// Run the network over a packed batch, returning one output per window
    pub fn forward(&self, xs: &Tensor, train: bool) -> Tensor {
        let (hidden, _state) = self.lstm_layer.seq(xs);
        let last = hidden.select(1, -1).dropout(self.desc.dropout, train);
        self.linear_layer.forward(&last).view([-1])
    }
    /// Load a model saved with `PredictionModel::save`, in inference mode
    pub fn load(path: &Path) -> Result<StockLstm> {
        let shape: LstmShape =
            serde_json::from_reader(BufReader::new(File::open(shape_path(path))?))?;
        let desc = StockLstmDesc {
            hidden: shape.hidden,
            layers: shape.layers,
            dropout: shape.dropout,
            ..Default::default()
        };
        let mut model = desc.build(shape.window_size, false);
        model.vs.load(path)?;
        Ok(model)
    }
}

impl PredictionModel for StockLstm {
    fn predict(&self, windows: &[Window]) -> Result<Vec<f64>> {
        if windows.is_empty() {
            return Ok(Vec::new());
        }
        if windows.iter().any(|window| window.len() != self.window_size) {
            return Err(Error::Model(format!(
                "model takes windows of {} days",
                self.window_size
            )));
        }
        let xs = pack(windows)?.to_device(self.vs.device());
        let out = tch::no_grad(|| self.forward(&xs, false)).to_kind(Kind::Double);
        Ok((0..windows.len() as i64)
            .map(|i| out.double_value(&[i]))
            .collect())
    }
    fn save(&self, path: &Path) -> Result<()> {
        self.vs.save(path)?;
        let shape = LstmShape {
            window_size: self.window_size,
            hidden: self.desc.hidden,
            layers: self.desc.layers,
            dropout: self.desc.dropout,
        };
        let mut wtr = BufWriter::new(File::create(shape_path(path))?);
        serde_json::to_writer(&mut wtr, &shape)?;
        wtr.flush()?;
        Ok(())
    }
}

impl ModelTrainer for StockLstmDesc {
    type Model = StockLstm;

    fn train(&self, x: &[Window], y: &[f64], epochs: usize, batch_size: usize) -> Result<StockLstm> {
        if x.is_empty() || x.len() != y.len() {
            return Err(Error::InvalidParameter(format!(
                "cannot train on {} windows with {} labels",
                x.len(),
                y.len()
            )));
        }
        let window_size = x[0].len();
        let model = self.build(window_size, true);
        let device = model.vs.device();
        let mut opt = nn::Adam::default().build(&model.vs, self.learning_rate)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..x.len()).collect();
        let batch_size = batch_size.max(1);

        let epochs_progress = if self.progress {
            let bar = ProgressBar::new(epochs as u64);
            bar.set_style(
                ProgressStyle::default_bar().template("[{msg:<15}] {wide_bar} {pos:>4}/{len:4}"),
            );
            bar.set_message("no loss");
            bar
        } else {
            ProgressBar::hidden()
        };

        for epoch in 0..epochs {
            order.shuffle(&mut rng);
            let mut batch = 0;
            let mut sum_loss = 0.0;
            for chunk in order.chunks(batch_size) {
                let xs: Vec<Window> = chunk.iter().map(|i| x[*i].clone()).collect();
                let ys: Vec<f32> = chunk.iter().map(|i| y[*i] as f32).collect();
                let xs = pack(&xs)?.to_device(device);
                let ys = Tensor::from_slice(&ys).to_device(device);
                let loss = model.forward(&xs, true).mse_loss(&ys, Reduction::Mean);
                opt.backward_step(&loss);
                batch += 1;
                sum_loss += loss.double_value(&[]);
            }
            let loss = sum_loss / batch as f64;
            debug!(epoch, loss, "finished epoch");
            epochs_progress.set_message(&format!("loss = {:.5}", loss));
            epochs_progress.inc(1);
        }
        epochs_progress.finish_and_clear();
        info!(windows = x.len(), epochs, "trained stacked LSTM");

        // Rebuild without dropout for inference
        let mut eval = self.build(window_size, false);
        eval.vs.copy(&model.vs)?;
        Ok(eval)
    }
}
