/*!
End-to-end training of one asset
*/
use crate::artifacts::ArtifactStore;
use crate::config::{AppConfig, AssetConfig};
use crate::data::wiki::{RevisionSource, WikiEditAggregator};
use crate::data::{MarketDataSource, MarketFeatureBuilder};
use crate::error::{Error, Result};
use crate::model::{ModelTrainer, PredictionModel, TrainingParams};
use crate::sentiment::SentimentAnnotator;
use crate::window::{build_train_windows, evaluate, ForecastMetrics};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// The outcome of training one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// The asset's symbol
    pub symbol: String,
    /// The market data ticker
    pub ticker: String,
    /// Aligned rows available
    pub rows: usize,
    /// Training windows
    pub train_windows: usize,
    /// Test windows
    pub test_windows: usize,
    /// Test set error of the unscaled predictions, if there was a test set
    pub metrics: Option<ForecastMetrics>,
    /// The last day of data
    pub last_date: NaiveDate,
    /// The close on `last_date`
    pub last_close: f64,
    /// The predicted close of the day after `last_date`
    pub next_close: f64,
}

/// Trains and persists per-asset models
pub struct TrainingPipeline<T> {
    market: MarketFeatureBuilder,
    revisions: Arc<dyn RevisionSource>,
    annotator: SentimentAnnotator,
    store: ArtifactStore,
    trainer: T,
    params: TrainingParams,
    window_size: usize,
    train_fraction: f64,
    progress: bool,
}

impl<T: ModelTrainer> TrainingPipeline<T> {
    /// Create a pipeline with default windowing and training parameters
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        revisions: Arc<dyn RevisionSource>,
        annotator: SentimentAnnotator,
        store: ArtifactStore,
        trainer: T,
    ) -> TrainingPipeline<T> {
        let defaults = AppConfig::default();
        TrainingPipeline {
            market: MarketFeatureBuilder::new(market),
            revisions,
            annotator,
            store,
            trainer,
            params: defaults.training,
            window_size: defaults.window_size,
            train_fraction: defaults.train_fraction,
            progress: false,
        }
    }
    /// Take windowing and training parameters from `config`
    pub fn configure(mut self, config: &AppConfig) -> TrainingPipeline<T> {
        self.params = config.training;
        self.window_size = config.window_size;
        self.train_fraction = config.train_fraction;
        self
    }
    /// Show progress bars
    pub fn with_progress(mut self, progress: bool) -> TrainingPipeline<T> {
        self.progress = progress;
        self
    }
    /// The artifact store models are saved to
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }
    /// Train `asset` on data up to `today`, evaluate it and save its artifacts
    pub async fn run(&self, asset: &AssetConfig, today: NaiveDate) -> Result<TrainingReport> {
        let symbol = asset.symbol.as_str();
        let ticker = asset.ticker();
        info!(symbol, %ticker, page = %asset.wiki_page, "training asset");

        let wiki = WikiEditAggregator::new(
            self.revisions.clone(),
            self.annotator.clone(),
            Some(self.store.wiki_cache_path(symbol)),
        )
        .with_progress(self.progress)
        .load_or_build(&asset.wiki_page, asset.max_revisions, today)
        .await?;
        let rows = self.market.build(&ticker, asset.start, today, &wiki).await?;
        let set = build_train_windows(&rows, self.window_size, self.train_fraction)?;

        let model = self.trainer.train(
            &set.x_train,
            &set.y_train,
            self.params.epochs,
            self.params.batch_size,
        )?;

        let predictions: Vec<f64> = model
            .predict(&set.x_test)?
            .into_iter()
            .map(|scaled| set.target_scaler.unscale_value(0, scaled))
            .collect();
        let metrics = evaluate(&predictions, &set.y_test);
        if let Some(metrics) = &metrics {
            info!(
                symbol,
                rmse = metrics.rmse,
                mae = metrics.mae,
                mape = metrics.mape,
                "evaluated on test set"
            );
        }

        let next_close = model
            .predict(std::slice::from_ref(&set.next_window))?
            .pop()
            .map(|scaled| set.target_scaler.unscale_value(0, scaled))
            .ok_or_else(|| Error::Model("model returned no prediction".to_owned()))?;
        let last = rows.last().ok_or(Error::InsufficientData {
            required: self.window_size + 1,
            obtained: 0,
        })?;
        info!(symbol, last_close = last.market.close, next_close, "next day forecast");

        self.store
            .save(symbol, &model, &set.feature_scaler, &set.target_scaler)?;

        Ok(TrainingReport {
            symbol: symbol.to_owned(),
            ticker,
            rows: rows.len(),
            train_windows: set.x_train.len(),
            test_windows: set.x_test.len(),
            metrics,
            last_date: last.date(),
            last_close: last.market.close,
            next_close,
        })
    }
}
