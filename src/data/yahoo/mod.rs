/*!
[Yahoo Finance](https://finance.yahoo.com/) daily chart data
*/
use super::{normalize_column, MarketDataSource, OhlcvRecord};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// The default chart API endpoint
pub const YAHOO_CHART_API: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// A Yahoo Finance chart API client
#[derive(Debug, Clone)]
pub struct YahooFinance {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<HashMap<String, Vec<Option<f64>>>>,
}

impl YahooFinance {
    /// Create a client against a chart API endpoint with a request timeout
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<YahooFinance> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("coinburn/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(YahooFinance {
            client,
            base_url: base_url.into(),
        })
    }
}

/// Midnight UTC of a date, as a UNIX timestamp
fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight).timestamp())
        .unwrap_or_default()
}

/// Turn a chart response into daily records within `[start, end]`
fn records(response: ChartResponse, start: NaiveDate, end: NaiveDate) -> Vec<OhlcvRecord> {
    let mut records = Vec::new();
    for result in response.chart.result.unwrap_or_default() {
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
        let columns: Vec<_> = quote
            .iter()
            .filter_map(|(label, values)| normalize_column(label).map(|column| (column, values)))
            .collect();
        for (i, ts) in result.timestamp.iter().enumerate() {
            let date = match Utc.timestamp_opt(*ts, 0).single() {
                Some(time) => time.date_naive(),
                None => continue,
            };
            if date < start || date > end {
                continue;
            }
            let mut record = OhlcvRecord::missing(date);
            for (column, values) in columns.iter() {
                if let Some(Some(value)) = values.get(i) {
                    record.set(*column, *value);
                }
            }
            records.push(record);
        }
    }
    records.sort_by_key(|record| record.date);
    records
}

#[async_trait]
impl MarketDataSource for YahooFinance {
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvRecord>> {
        let period1 = unix_midnight(start).to_string();
        let period2 = unix_midnight(end + Duration::days(1)).to_string();
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), ticker);
        let response = self
            .client
            .get(url.as_str())
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
                ("events", "history"),
            ])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(ticker, "chart API has no data");
            return Ok(Vec::new());
        }
        let response: ChartResponse = response.error_for_status()?.json().await?;
        let records = records(response, start, end);
        debug!(ticker, %start, %end, rows = records.len(), "fetched daily chart");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chart_with_gaps() {
        let body = r#"{"chart": {"error": null, "result": [{
            "meta": {"symbol": "BTC-USD"},
            "timestamp": [1704067200, 1704153600, 1704240000],
            "indicators": {
                "quote": [{
                    "open": [42280.2, 44187.1, 45000.0],
                    "high": [44175.4, 45899.7, 46000.0],
                    "low": [42214.9, 44176.9, 44000.0],
                    "close": [44167.3, 44957.9, null],
                    "volume": [18426978443, 39335274536, 1]
                }],
                "adjclose": [{"adjclose": [44167.3, 44957.9, null]}]
            }
        }]}}"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let rows = records(response, day(1), day(3));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, day(1));
        assert_eq!(rows[1].close, 44957.9);
        assert_eq!(rows[1].volume, 39335274536.0);
        assert!(rows[2].close.is_nan());
        assert!(!rows[2].is_complete());
    }

    #[test]
    fn missing_result_is_empty() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found"}}}"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(records(response, day, day).is_empty());
    }

    #[test]
    fn midnight_timestamps() {
        assert_eq!(
            unix_midnight(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            1704067200
        );
    }
}
