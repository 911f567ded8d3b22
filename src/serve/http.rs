/*!
The HTTP surface of the inference service
*/
use super::{InferenceService, Prediction};
use crate::error::{Error, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Query parameters of `GET /predict`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictQuery {
    /// The asset to predict. May be omitted when exactly one asset is loaded.
    pub symbol: Option<String>,
}

/// Body of `GET /assets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetList {
    /// Loaded symbols, sorted
    pub assets: Vec<String>,
}

impl Error {
    /// The HTTP status this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InsufficientData { .. } | Error::MissingSymbol { .. } => StatusCode::BAD_REQUEST,
            Error::AssetNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Error::InsufficientData { required, obtained } => json!({
                "error": self.to_string(),
                "required": required,
                "obtained": obtained,
            }),
            Error::AssetNotFound {
                requested,
                available,
            } => json!({
                "error": self.to_string(),
                "requested": requested,
                "available": available,
            }),
            Error::MissingSymbol { available } => json!({
                "error": self.to_string(),
                "available": available,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        if status.is_server_error() {
            warn!(error = %self, "prediction failed");
        }
        (status, Json(body)).into_response()
    }
}

/// Pick the symbol to predict when none was given
fn default_symbol(service: &InferenceService) -> Result<String> {
    let mut symbols = service.registry().symbols();
    if symbols.len() == 1 {
        Ok(symbols.remove(0))
    } else {
        Err(Error::MissingSymbol { available: symbols })
    }
}

async fn predict_query(
    State(service): State<Arc<InferenceService>>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<Prediction>> {
    let symbol = match query.symbol {
        Some(symbol) if !symbol.trim().is_empty() => symbol,
        _ => default_symbol(&service)?,
    };
    predict(&service, &symbol).await
}

async fn predict_path(
    State(service): State<Arc<InferenceService>>,
    Path(symbol): Path<String>,
) -> Result<Json<Prediction>> {
    predict(&service, &symbol).await
}

async fn predict(service: &InferenceService, symbol: &str) -> Result<Json<Prediction>> {
    let prediction = service.predict(symbol.trim()).await?;
    Ok(Json(prediction))
}

async fn assets(State(service): State<Arc<InferenceService>>) -> Json<AssetList> {
    Json(AssetList {
        assets: service.registry().symbols(),
    })
}

/// The service's routes
pub fn router(service: Arc<InferenceService>) -> Router {
    Router::new()
        .route("/predict", get(predict_query))
        .route("/predict/:symbol", get(predict_path))
        .route("/assets", get(assets))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve on `addr` until the process is stopped
pub async fn serve(service: Arc<InferenceService>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr,
        assets = ?service.registry().symbols(),
        "inference API listening"
    );
    axum::serve(listener, router(service)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        let insufficient = Error::InsufficientData {
            required: 60,
            obtained: 12,
        };
        assert_eq!(insufficient.status(), StatusCode::BAD_REQUEST);
        let missing = Error::AssetNotFound {
            requested: "XRP".to_owned(),
            available: vec!["BTC".to_owned()],
        };
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let unavailable = Error::DataUnavailable {
            ticker: "BTC-USD".to_owned(),
        };
        assert_eq!(unavailable.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let no_symbol = Error::MissingSymbol { available: vec![] };
        assert_eq!(no_symbol.status(), StatusCode::BAD_REQUEST);
        let mismatch = Error::Model("model takes windows of 20 days, got 60".to_owned());
        assert_eq!(mismatch.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let invalid = Error::InvalidParameter("window_size must be positive".to_owned());
        assert_eq!(invalid.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
