/*!
Per-asset cryptocurrency price prediction from daily market data and Wikipedia edit sentiment.

Edit comments on an asset's Wikipedia page are scored for sentiment and rolled up into a smoothed
daily series, which is joined with daily market data and cut into sliding windows for a sequence
regressor. Trained models are persisted per asset and served over HTTP.

The default model is a linear regressor over the window; building with the `torch` feature swaps
in a stacked LSTM on [PyTorch](https://pytorch.org/) bindings.
*/
#![forbid(missing_docs)]

pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
#[cfg(feature = "torch")]
pub mod lstm;
pub mod model;
pub mod pipeline;
pub mod sentiment;
pub mod serve;
pub mod util;
pub mod window;

pub use error::{Error, Result};

/// The floating point type to be used for CPU calculations
pub type CpuFloat = f64;

/// The floating point type to be used for GPU calculations
pub type GpuFloat = f32;
