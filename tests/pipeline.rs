/*!
Train an asset end to end on fake data, then serve a prediction from the saved artifacts
*/
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use coinburn::artifacts::ArtifactStore;
use coinburn::config::{AppConfig, AssetConfig};
use coinburn::data::fake::random_walk;
use coinburn::data::wiki::{Revision, RevisionSource};
use coinburn::data::{MarketDataSource, OhlcvRecord};
use coinburn::model::default_trainer;
use coinburn::pipeline::TrainingPipeline;
use coinburn::sentiment::{LexiconClassifier, SentimentAnnotator};
use coinburn::serve::{InferenceService, ModelRegistry};
use coinburn::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DAYS: usize = 240;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
}

fn today() -> NaiveDate {
    start() + Duration::days(DAYS as i64 - 1)
}

struct FakeMarket {
    ticker: String,
    records: Vec<OhlcvRecord>,
}

impl FakeMarket {
    fn new(ticker: &str) -> FakeMarket {
        FakeMarket {
            ticker: ticker.to_owned(),
            records: random_walk(StdRng::seed_from_u64(11), start(), 30000.0, 0.03)
                .unwrap()
                .take(DAYS)
                .collect(),
        }
    }
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvRecord>> {
        if ticker != self.ticker {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .iter()
            .filter(|record| record.date >= start && record.date <= end)
            .copied()
            .collect())
    }
}

/// Two edits every third day, alternating in tone
#[derive(Default)]
struct FakeWiki {
    calls: AtomicUsize,
}

#[async_trait]
impl RevisionSource for FakeWiki {
    async fn revisions(&self, _page: &str, limit: usize) -> Result<Vec<Revision>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut revisions = Vec::new();
        for day in (0..DAYS).rev().filter(|day| day % 3 == 0) {
            let date = start() + Duration::days(day as i64);
            let timestamp = date.and_hms_opt(12, 0, 0).unwrap().and_utc();
            let comment = if day % 2 == 0 {
                "fixed citation, good improvement"
            } else {
                "reverted vandalism and spam"
            };
            revisions.push(Revision {
                timestamp,
                comment: comment.to_owned(),
            });
            revisions.push(Revision {
                timestamp,
                comment: String::new(),
            });
        }
        revisions.truncate(limit);
        Ok(revisions)
    }
}

fn config(artifacts: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.artifacts_dir = artifacts.to_owned();
    config.window_size = 20;
    config.training.epochs = 3;
    config.training.batch_size = 16;
    config
}

fn btc() -> AssetConfig {
    AssetConfig {
        symbol: "BTC".to_owned(),
        quote: "USD".to_owned(),
        wiki_page: "Bitcoin".to_owned(),
        max_revisions: 2000,
        start: start(),
    }
}

#[tokio::test]
async fn train_then_serve() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let market = Arc::new(FakeMarket::new("BTC-USD"));
    let wiki = Arc::new(FakeWiki::default());
    let store = ArtifactStore::new(dir.path());
    let pipeline = TrainingPipeline::new(
        market.clone(),
        wiki.clone(),
        SentimentAnnotator::new(Arc::new(LexiconClassifier::new())),
        store.clone(),
        default_trainer(&config.training, false),
    )
    .configure(&config);

    let report = pipeline.run(&btc(), today()).await.unwrap();
    assert_eq!(report.ticker, "BTC-USD");
    assert_eq!(report.rows, DAYS);
    assert_eq!(report.train_windows, DAYS * 8 / 10 - 20);
    assert_eq!(report.test_windows, DAYS - DAYS * 8 / 10);
    assert_eq!(report.last_date, today());
    assert!(report.next_close.is_finite());
    assert!(report.metrics.unwrap().rmse.is_finite());
    assert!(store.has_asset("BTC"));
    assert!(store.wiki_cache_path("BTC").is_file());

    // A second run reuses the cached wiki series
    pipeline.run(&btc(), today()).await.unwrap();
    assert_eq!(wiki.calls.load(Ordering::SeqCst), 1);

    let registry = ModelRegistry::load(&store, &config.assets);
    assert_eq!(registry.symbols(), vec!["BTC".to_owned()]);
    let service = InferenceService::from_config(&config, registry, market.clone());
    let prediction = service.predict_at("btc", today()).await.unwrap();
    assert_eq!(prediction.ticker, "BTC-USD");
    assert_eq!(prediction.actual_value, market.records[DAYS - 1].close);
    assert!(prediction.prediction_value.is_finite());
    let variation = (prediction.prediction_value - prediction.actual_value)
        / prediction.actual_value
        * 100.0;
    assert!((prediction.variation_percent - variation).abs() < 1e-9);
}

#[tokio::test]
async fn too_little_history_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.window_size = 300;
    let pipeline = TrainingPipeline::new(
        Arc::new(FakeMarket::new("BTC-USD")),
        Arc::new(FakeWiki::default()),
        SentimentAnnotator::new(Arc::new(LexiconClassifier::new())),
        ArtifactStore::new(dir.path()),
        default_trainer(&config.training, false),
    )
    .configure(&config);
    match pipeline.run(&btc(), today()).await {
        Err(coinburn::Error::InsufficientData { required, obtained }) => {
            assert_eq!(required, 301);
            assert_eq!(obtained, DAYS * 8 / 10);
        }
        other => panic!("unexpected {:?}", other.map(|report| report.rows)),
    }
}

#[tokio::test]
async fn unknown_ticker_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let pipeline = TrainingPipeline::new(
        Arc::new(FakeMarket::new("ETH-USD")),
        Arc::new(FakeWiki::default()),
        SentimentAnnotator::new(Arc::new(LexiconClassifier::new())),
        ArtifactStore::new(dir.path()),
        default_trainer(&config.training, false),
    )
    .configure(&config);
    assert!(matches!(
        pipeline.run(&btc(), today()).await,
        Err(coinburn::Error::DataUnavailable { .. })
    ));
}
