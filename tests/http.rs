/*!
Drive the HTTP router against stub models and market data
*/
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, NaiveDate, Utc};
use coinburn::artifacts::AssetArtifacts;
use coinburn::data::scale::MinMaxScaler;
use coinburn::data::{MarketDataSource, OhlcvRecord, FEATURES};
use coinburn::model::{LinearWindowModel, PredictionModel};
use coinburn::serve::http::router;
use coinburn::serve::{InferenceService, ModelRegistry};
use coinburn::window::Window;
use coinburn::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const WINDOW: usize = 60;

/// Always predicts the same scaled value
struct Constant(f64);

impl PredictionModel for Constant {
    fn predict(&self, windows: &[Window]) -> Result<Vec<f64>> {
        assert!(windows.iter().all(|window| window.len() == WINDOW));
        Ok(vec![self.0; windows.len()])
    }
    fn save(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Serves `days` days ending today per ticker, all closing at 100
struct FlatMarket {
    days: HashMap<String, usize>,
}

#[async_trait]
impl MarketDataSource for FlatMarket {
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvRecord>> {
        let days = self.days.get(ticker).copied().unwrap_or(0);
        let today = Utc::now().date_naive();
        Ok((0..days)
            .rev()
            .map(|ago| OhlcvRecord {
                date: today - Duration::days(ago as i64),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: 1000.0,
            })
            .filter(|record| record.date >= start && record.date <= end)
            .collect())
    }
}

fn artifacts(prediction: f64) -> AssetArtifacts {
    AssetArtifacts {
        model: Box::new(Constant(prediction)),
        feature_scaler: MinMaxScaler {
            min: vec![0.0; FEATURES],
            max: vec![1.0; FEATURES],
        },
        target_scaler: MinMaxScaler {
            min: vec![0.0],
            max: vec![1.0],
        },
    }
}

fn flat_market(tickers: &[(&str, usize)]) -> Arc<FlatMarket> {
    let days = tickers
        .iter()
        .map(|(ticker, days)| (ticker.to_string(), *days))
        .collect();
    Arc::new(FlatMarket { days })
}

fn service() -> Arc<InferenceService> {
    let mut registry = ModelRegistry::new();
    registry.insert("UP", "UP-USD", artifacts(100.06));
    registry.insert("DOWN", "DOWN-USD", artifacts(99.94));
    registry.insert("FLAT", "FLAT-USD", artifacts(100.0));
    registry.insert("NEW", "NEW-USD", artifacts(100.0));
    let market = flat_market(&[
        ("UP-USD", 90),
        ("DOWN-USD", 90),
        ("FLAT-USD", 90),
        ("NEW-USD", 12),
    ]);
    Arc::new(InferenceService::new(
        registry,
        market,
        WINDOW,
        30,
        0.0005,
    ))
}

async fn get(service: Arc<InferenceService>, uri: &str) -> (StatusCode, Value) {
    let response = router(service)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn predicts_each_direction() {
    let cases = [("UP", "Alta"), ("DOWN", "Queda"), ("FLAT", "Manteve")];
    for (symbol, direction) in cases.iter() {
        let (status, body) = get(service(), &format!("/predict?symbol={}", symbol)).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["ticker"], format!("{}-USD", symbol));
        assert_eq!(body["actual_value"], 100.0);
        assert_eq!(body["flutation"], *direction);
    }
    let (_, body) = get(service(), "/predict/up").await;
    let variation = body["variation_percent"].as_f64().unwrap();
    assert!((variation - 0.06).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_asset_lists_loaded_assets() {
    let (status, body) = get(service(), "/predict?symbol=XRP").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["requested"], "XRP");
    assert_eq!(
        body["available"],
        serde_json::json!(["DOWN", "FLAT", "NEW", "UP"])
    );
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn short_history_is_a_bad_request() {
    let (status, body) = get(service(), "/predict/NEW").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["required"], 60);
    assert_eq!(body["obtained"], 12);
}

#[tokio::test]
async fn symbol_is_required_with_several_assets() {
    let (status, body) = get(service(), "/predict").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["available"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn lone_asset_is_the_default() {
    let mut registry = ModelRegistry::new();
    registry.insert("UP", "UP-USD", artifacts(100.06));
    let service = Arc::new(InferenceService::new(
        registry,
        flat_market(&[("UP-USD", 90)]),
        WINDOW,
        30,
        0.0005,
    ));
    let (status, body) = get(service.clone(), "/predict").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticker"], "UP-USD");
    let (_, assets) = get(service, "/assets").await;
    assert_eq!(assets["assets"], serde_json::json!(["UP"]));
}

#[tokio::test]
async fn window_mismatch_is_a_server_error() {
    let mut registry = ModelRegistry::new();
    let mut mismatched = artifacts(0.0);
    mismatched.model = Box::new(LinearWindowModel::zeros(20));
    registry.insert("BTC", "BTC-USD", mismatched);
    let service = Arc::new(InferenceService::new(
        registry,
        flat_market(&[("BTC-USD", 90)]),
        WINDOW,
        30,
        0.0005,
    ));
    let (status, body) = get(service, "/predict?symbol=BTC").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("20 days"), "{}", body);
}

#[tokio::test]
async fn empty_market_data_is_a_server_error() {
    let mut registry = ModelRegistry::new();
    registry.insert("GONE", "GONE-USD", artifacts(100.0));
    let service = Arc::new(InferenceService::new(
        registry,
        flat_market(&[]),
        WINDOW,
        30,
        0.0005,
    ));
    let (status, body) = get(service, "/predict/GONE").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("GONE-USD"), "{}", body);
    assert!(body.get("required").is_none());
}
