/*!
Data processing and IO functions
*/
use crate::error::{Error, Result};
use crate::*;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub mod csvfile;
pub mod fake;
pub mod scale;
pub mod wiki;
pub mod yahoo;

pub use wiki::DailyEditStats;

/// The number of features fed into a model per day
pub const FEATURES: usize = 5;

/// The feature names, in the order they appear in a `FeatureVector`
pub const FEATURE_NAMES: [&str; FEATURES] = [
    "close",
    "volume",
    "edit_count",
    "sentiment_mean",
    "neg_sentiment_ratio",
];

/// The index of the prediction target (the closing price) within a `FeatureVector`
pub const TARGET_FEATURE: usize = 0;

/// One day of model input
pub type FeatureVector<F = CpuFloat> = [F; FEATURES];

/// Daily market data for an asset. Values the provider did not report are `NaN`.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct OhlcvRecord<F = CpuFloat> {
    /// The trading day
    pub date: NaiveDate,
    /// The opening price
    pub open: F,
    /// The high price
    pub high: F,
    /// The low price
    pub low: F,
    /// The closing price
    pub close: F,
    /// The traded volume
    pub volume: F,
}

impl OhlcvRecord {
    /// A record with every value missing
    pub fn missing(date: NaiveDate) -> OhlcvRecord {
        OhlcvRecord {
            date,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
        }
    }
    /// Set the value of a column
    pub fn set(&mut self, column: Column, value: f64) {
        match column {
            Column::Open => self.open = value,
            Column::High => self.high = value,
            Column::Low => self.low = value,
            Column::Close => self.close = value,
            Column::Volume => self.volume = value,
        }
    }
    /// Get the value of a column
    pub fn get(&self, column: Column) -> f64 {
        match column {
            Column::Open => self.open,
            Column::High => self.high,
            Column::Low => self.low,
            Column::Close => self.close,
            Column::Volume => self.volume,
        }
    }
    /// Whether every value of this record is present
    pub fn is_complete(&self) -> bool {
        Column::ALL.iter().all(|column| self.get(*column).is_finite())
    }
}

/// A market data column, after normalization
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// Opening price
    Open,
    /// High price
    High,
    /// Low price
    Low,
    /// Closing price
    Close,
    /// Volume
    Volume,
}

impl Column {
    /// Every column, in output order
    pub const ALL: [Column; 5] = [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
    ];
    /// The normalized name of this column
    pub fn name(self) -> &'static str {
        match self {
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
        }
    }
}

/// Normalize a provider column label.
///
/// Multi-level labels such as `('Close', 'BTC-USD')`, `Close/BTC-USD` or `Close|BTC-USD` are reduced
/// to their first level, and names are lower-cased. Adjusted close columns are dropped, since they
/// duplicate `close`, as is anything unrecognized.
pub fn normalize_column(label: &str) -> Option<Column> {
    let label = label.trim().trim_start_matches('(').trim_end_matches(')');
    let first = label.split(|c| c == ',' || c == '/' || c == '|').next()?;
    let name = first
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim()
        .to_lowercase();
    match name.as_str() {
        "open" => Some(Column::Open),
        "high" => Some(Column::High),
        "low" => Some(Column::Low),
        "close" => Some(Column::Close),
        "volume" => Some(Column::Volume),
        _ => None,
    }
}

/// A provider of daily market data
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch daily records for `ticker` over `[start, end]`, in chronological order
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvRecord>>;
}

/// One day of market data joined with that day's smoothed wiki statistics
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AlignedRow {
    /// The market side of the row
    pub market: OhlcvRecord,
    /// The wiki side of the row
    pub wiki: DailyEditStats,
}

impl AlignedRow {
    /// The date of this row
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.market.date
    }
    /// The model features of this row, in `FEATURE_NAMES` order
    #[inline]
    pub fn features(&self) -> FeatureVector {
        [
            self.market.close,
            self.market.volume,
            self.wiki.edit_count,
            self.wiki.sentiment_mean,
            self.wiki.neg_sentiment_ratio,
        ]
    }
    /// Whether every joined value is present
    pub fn is_complete(&self) -> bool {
        self.market.is_complete() && self.wiki.is_complete()
    }
}

/// Inner join market data and wiki statistics on date, then drop rows with any missing value.
///
/// Output is chronological. If the market data holds a date twice, the last record wins.
pub fn align(market: &[OhlcvRecord], wiki: &[DailyEditStats]) -> Vec<AlignedRow> {
    let wiki: BTreeMap<NaiveDate, &DailyEditStats> =
        wiki.iter().map(|stats| (stats.date, stats)).collect();
    let market: BTreeMap<NaiveDate, &OhlcvRecord> =
        market.iter().map(|record| (record.date, record)).collect();
    let joined: Vec<AlignedRow> = market
        .iter()
        .filter_map(|(date, market)| {
            wiki.get(date).map(|wiki| AlignedRow {
                market: **market,
                wiki: **wiki,
            })
        })
        .collect();
    let total = joined.len();
    let complete: Vec<AlignedRow> = joined.into_iter().filter(AlignedRow::is_complete).collect();
    debug!(
        joined = total,
        dropped = total - complete.len(),
        "aligned market and wiki data"
    );
    complete
}

/// Builds the aligned daily dataset for an asset
#[derive(Clone)]
pub struct MarketFeatureBuilder {
    source: Arc<dyn MarketDataSource>,
}

impl MarketFeatureBuilder {
    /// Create a builder over a market data source
    pub fn new(source: Arc<dyn MarketDataSource>) -> MarketFeatureBuilder {
        MarketFeatureBuilder { source }
    }
    /// Fetch market data over `[start, end]` and join it with a smoothed wiki series
    pub async fn build(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        wiki: &[DailyEditStats],
    ) -> Result<Vec<AlignedRow>> {
        let market = self.source.fetch_daily(ticker, start, end).await?;
        if market.is_empty() {
            return Err(Error::DataUnavailable {
                ticker: ticker.to_owned(),
            });
        }
        let rows = align(&market, wiki);
        info!(
            ticker,
            market_rows = market.len(),
            wiki_rows = wiki.len(),
            aligned_rows = rows.len(),
            "built aligned dataset"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(d: u32, close: f64) -> OhlcvRecord {
        OhlcvRecord {
            date: day(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0 * close,
        }
    }

    fn stats(d: u32, edits: f64) -> DailyEditStats {
        DailyEditStats {
            date: day(d),
            edit_count: edits,
            sentiment_mean: 0.25,
            neg_sentiment_ratio: 0.5,
        }
    }

    #[test]
    fn normalizes_column_labels() {
        assert_eq!(normalize_column("Close"), Some(Column::Close));
        assert_eq!(normalize_column(" VOLUME "), Some(Column::Volume));
        assert_eq!(normalize_column("('Open', 'BTC-USD')"), Some(Column::Open));
        assert_eq!(normalize_column("High/ETH-USD"), Some(Column::High));
        assert_eq!(normalize_column("low|DOGE-USD"), Some(Column::Low));
        assert_eq!(normalize_column("Adj Close"), None);
        assert_eq!(normalize_column("adjclose"), None);
        assert_eq!(normalize_column("Date"), None);
    }

    #[test]
    fn inner_join_drops_unmatched_and_incomplete_rows() {
        let mut gap = record(3, 12.0);
        gap.volume = f64::NAN;
        let market = vec![record(1, 10.0), record(2, 11.0), gap, record(5, 14.0)];
        let wiki = vec![stats(2, 1.0), stats(3, 2.0), stats(4, 3.0), stats(5, 4.0)];
        let rows = align(&market, &wiki);
        let dates: Vec<_> = rows.iter().map(AlignedRow::date).collect();
        assert_eq!(dates, vec![day(2), day(5)]);
        assert_eq!(rows[1].features(), [14.0, 140.0, 4.0, 0.25, 0.5]);
    }

    #[test]
    fn join_is_chronological() {
        let market = vec![record(4, 13.0), record(2, 11.0)];
        let wiki = vec![stats(2, 1.0), stats(4, 3.0)];
        let dates: Vec<_> = align(&market, &wiki).iter().map(AlignedRow::date).collect();
        assert_eq!(dates, vec![day(2), day(4)]);
    }
}
