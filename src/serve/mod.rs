/*!
Single-point inference over persisted per-asset models

The `ModelRegistry` is built once, before serving, and only read afterwards. Each prediction
fetches recent market data, fills in the wiki features with fixed placeholders, scales with the
persisted feature scaler and unscales the model output with the persisted target scaler.
*/
use crate::artifacts::{ArtifactStore, AssetArtifacts};
use crate::config::{AppConfig, AssetConfig};
use crate::data::{FeatureVector, MarketDataSource, OhlcvRecord};
use crate::error::{Error, Result};
use crate::window::scale_window;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tracing::{info, warn};

pub mod http;

/// The edit count fed to models when serving, as live wiki data is not fetched
pub const LIVE_EDIT_COUNT: f64 = 0.0;

/// The mean sentiment fed to models when serving
pub const LIVE_SENTIMENT_MEAN: f64 = 0.0;

/// The negative sentiment ratio fed to models when serving
pub const LIVE_NEG_SENTIMENT_RATIO: f64 = 0.0;

/// The direction of a predicted move
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Up by more than the threshold
    Alta,
    /// Down by more than the threshold
    Queda,
    /// Within the threshold
    Manteve,
}

impl Direction {
    /// Classify a move from `actual` to `prediction`.
    ///
    /// The threshold is `actual * threshold_fraction`; moves strictly beyond it in either
    /// direction count as `Alta` or `Queda`.
    pub fn classify(actual: f64, prediction: f64, threshold_fraction: f64) -> Direction {
        let threshold = actual * threshold_fraction;
        let diff = prediction - actual;
        if diff > threshold {
            Direction::Alta
        } else if diff < -threshold {
            Direction::Queda
        } else {
            Direction::Manteve
        }
    }
}

impl Display for Direction {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        let name = match self {
            Direction::Alta => "Alta",
            Direction::Queda => "Queda",
            Direction::Manteve => "Manteve",
        };
        write!(fmt, "{}", name)
    }
}

/// A next-day prediction for an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The market data ticker
    pub ticker: String,
    /// The last observed close
    pub actual_value: f64,
    /// The predicted next close
    pub prediction_value: f64,
    /// The predicted change, in percent of `actual_value`
    pub variation_percent: f64,
    /// The predicted direction
    #[serde(rename = "flutation")]
    pub direction: Direction,
}

/// A loaded asset
pub struct RegisteredAsset {
    /// The market data ticker
    pub ticker: String,
    /// The model and its scalers
    pub artifacts: AssetArtifacts,
}

/// Loaded models, keyed by upper-case symbol
#[derive(Default)]
pub struct ModelRegistry {
    assets: BTreeMap<String, RegisteredAsset>,
}

impl ModelRegistry {
    /// An empty registry
    pub fn new() -> ModelRegistry {
        ModelRegistry::default()
    }
    /// Add an asset
    pub fn insert(&mut self, symbol: &str, ticker: impl Into<String>, artifacts: AssetArtifacts) {
        self.assets.insert(
            symbol.to_uppercase(),
            RegisteredAsset {
                ticker: ticker.into(),
                artifacts,
            },
        );
    }
    /// Load every configured asset with artifacts in `store`, skipping (and logging) the rest
    pub fn load(store: &ArtifactStore, assets: &[AssetConfig]) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for asset in assets {
            if !store.has_asset(&asset.symbol) {
                warn!(
                    symbol = %asset.symbol,
                    dir = %store.asset_dir(&asset.symbol).display(),
                    "no artifacts, skipping"
                );
                continue;
            }
            match store.load(&asset.symbol) {
                Ok(artifacts) => {
                    info!(symbol = %asset.symbol, "loaded model");
                    registry.insert(&asset.symbol, asset.ticker(), artifacts);
                }
                Err(err) => {
                    warn!(symbol = %asset.symbol, error = %err, "failed to load model, skipping")
                }
            }
        }
        registry
    }
    /// The loaded symbols, sorted
    pub fn symbols(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }
    /// Look up a symbol, ignoring case
    pub fn get(&self, symbol: &str) -> Result<&RegisteredAsset> {
        self.assets
            .get(&symbol.to_uppercase())
            .ok_or_else(|| Error::AssetNotFound {
                requested: symbol.to_owned(),
                available: self.symbols(),
            })
    }
    /// The number of loaded assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }
    /// Whether no asset is loaded
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// The model input used when serving a day of market data
pub fn live_features(record: &OhlcvRecord) -> FeatureVector {
    [
        record.close,
        record.volume,
        LIVE_EDIT_COUNT,
        LIVE_SENTIMENT_MEAN,
        LIVE_NEG_SENTIMENT_RATIO,
    ]
}

/// Answers prediction requests against a registry
pub struct InferenceService {
    registry: ModelRegistry,
    market: Arc<dyn MarketDataSource>,
    window_size: usize,
    buffer_days: usize,
    direction_threshold: f64,
}

impl InferenceService {
    /// Create a service
    pub fn new(
        registry: ModelRegistry,
        market: Arc<dyn MarketDataSource>,
        window_size: usize,
        buffer_days: usize,
        direction_threshold: f64,
    ) -> InferenceService {
        InferenceService {
            registry,
            market,
            window_size,
            buffer_days,
            direction_threshold,
        }
    }
    /// Create a service with the window and threshold settings of `config`
    pub fn from_config(
        config: &AppConfig,
        registry: ModelRegistry,
        market: Arc<dyn MarketDataSource>,
    ) -> InferenceService {
        InferenceService::new(
            registry,
            market,
            config.window_size,
            config.live_buffer_days,
            config.direction_threshold,
        )
    }
    /// The registry in use
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
    /// Predict the next close of `symbol` from data up to today
    pub async fn predict(&self, symbol: &str) -> Result<Prediction> {
        self.predict_at(symbol, Utc::now().date_naive()).await
    }
    /// Predict the next close of `symbol` from data up to `today`
    pub async fn predict_at(&self, symbol: &str, today: NaiveDate) -> Result<Prediction> {
        let asset = self.registry.get(symbol)?;
        let start = today - Duration::days((self.window_size + self.buffer_days) as i64);
        let records = self.market.fetch_daily(&asset.ticker, start, today).await?;
        if records.is_empty() {
            return Err(Error::DataUnavailable {
                ticker: asset.ticker.clone(),
            });
        }
        let valid: Vec<&OhlcvRecord> = records
            .iter()
            .filter(|record| record.close.is_finite() && record.volume.is_finite())
            .collect();
        let last = match valid.last() {
            Some(last) if valid.len() >= self.window_size => *last,
            _ => {
                return Err(Error::InsufficientData {
                    required: self.window_size,
                    obtained: valid.len(),
                })
            }
        };
        let features: Vec<FeatureVector> =
            valid.iter().map(|record| live_features(record)).collect();
        let window = scale_window(&features, &asset.artifacts.feature_scaler, self.window_size)?;
        let scaled = asset
            .artifacts
            .model
            .predict(&[window])?
            .pop()
            .ok_or_else(|| Error::Model("model returned no prediction".to_owned()))?;

        let actual = last.close;
        let prediction = asset.artifacts.target_scaler.unscale_value(0, scaled);
        let direction = Direction::classify(actual, prediction, self.direction_threshold);
        info!(
            ticker = %asset.ticker,
            actual,
            prediction,
            %direction,
            "served prediction"
        );
        Ok(Prediction {
            ticker: asset.ticker.clone(),
            actual_value: actual,
            prediction_value: prediction,
            variation_percent: (prediction - actual) / actual * 100.0,
            direction,
        })
    }
}
