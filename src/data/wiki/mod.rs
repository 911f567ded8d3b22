/*!
Wikipedia edit activity and sentiment, aggregated into a dense, smoothed daily series
*/
use crate::error::{Error, Result};
use crate::sentiment::SentimentAnnotator;
use crate::util::{days_inclusive, rolling_mean};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub mod mediawiki;

/// The trailing window, in days, of the rolling mean applied to daily statistics
pub const ROLLING_WINDOW: usize = 30;

/// A single page revision
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// When the revision was made
    pub timestamp: DateTime<Utc>,
    /// The edit summary; empty if none was given or it was hidden
    pub comment: String,
}

/// A revision reduced to its calendar day and sentiment score
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScoredRevision {
    /// The UTC date of the revision
    pub date: NaiveDate,
    /// The sentiment of the revision's comment, in `[-1, 1]`
    pub sentiment: f64,
}

/// Edit statistics for one calendar day
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEditStats {
    /// The day
    pub date: NaiveDate,
    /// The number of edits. Integral before smoothing.
    pub edit_count: f64,
    /// The mean sentiment of the day's edits
    pub sentiment_mean: f64,
    /// The fraction of the day's edits with strictly negative sentiment
    pub neg_sentiment_ratio: f64,
}

impl DailyEditStats {
    /// Statistics for a day without edits
    pub fn empty(date: NaiveDate) -> DailyEditStats {
        DailyEditStats {
            date,
            edit_count: 0.0,
            sentiment_mean: 0.0,
            neg_sentiment_ratio: 0.0,
        }
    }
    /// Whether every value is present
    pub fn is_complete(&self) -> bool {
        self.edit_count.is_finite()
            && self.sentiment_mean.is_finite()
            && self.neg_sentiment_ratio.is_finite()
    }
}

/// Raw per-day statistics over `[first revision date, today]`, with zeros on days without edits.
///
/// If `today` is before the last revision, the range ends at the last revision instead.
pub fn daily_stats(scored: &[ScoredRevision], today: NaiveDate) -> Vec<DailyEditStats> {
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for revision in scored {
        by_date
            .entry(revision.date)
            .or_insert_with(Vec::new)
            .push(revision.sentiment);
    }
    let (first, last) = match (by_date.keys().next(), by_date.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };
    days_inclusive(first, today.max(last))
        .map(|date| match by_date.get(&date) {
            Some(scores) => {
                let count = scores.len() as f64;
                let negative = scores.iter().filter(|score| **score < 0.0).count() as f64;
                DailyEditStats {
                    date,
                    edit_count: count,
                    sentiment_mean: scores.iter().sum::<f64>() / count,
                    neg_sentiment_ratio: negative / count,
                }
            }
            None => DailyEditStats::empty(date),
        })
        .collect()
}

/// Apply a trailing rolling mean with minimum period one to every statistic
pub fn smooth(raw: &[DailyEditStats], window: usize) -> Vec<DailyEditStats> {
    let column = |f: fn(&DailyEditStats) -> f64| {
        let values: Vec<f64> = raw.iter().map(f).collect();
        rolling_mean(&values, window)
    };
    let edit_count = column(|stats| stats.edit_count);
    let sentiment_mean = column(|stats| stats.sentiment_mean);
    let neg_sentiment_ratio = column(|stats| stats.neg_sentiment_ratio);
    raw.iter()
        .enumerate()
        .map(|(i, stats)| DailyEditStats {
            date: stats.date,
            edit_count: edit_count[i],
            sentiment_mean: sentiment_mean[i],
            neg_sentiment_ratio: neg_sentiment_ratio[i],
        })
        .collect()
}

/// Aggregate scored revisions into a dense, `ROLLING_WINDOW`-day smoothed daily series
pub fn aggregate(scored: &[ScoredRevision], today: NaiveDate) -> Vec<DailyEditStats> {
    smooth(&daily_stats(scored, today), ROLLING_WINDOW)
}

/// Read a daily series from a Reader
pub fn read_daily_stats<R: Read>(rdr: R) -> Result<Vec<DailyEditStats>> {
    csv::Reader::from_reader(rdr)
        .into_deserialize()
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Write a daily series to a Writer.
/// On success, return how many days were written
pub fn write_daily_stats<W: Write>(wtr: W, stats: &[DailyEditStats]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(wtr);
    for day in stats {
        wtr.serialize(day)?;
    }
    wtr.flush()?;
    Ok(stats.len())
}

/// A source of page revisions, newest first
#[async_trait]
pub trait RevisionSource: Send + Sync {
    /// Fetch at most `limit` revisions of `page`
    async fn revisions(&self, page: &str, limit: usize) -> Result<Vec<Revision>>;
}

/// Builds the smoothed daily wiki series for a page, caching it on disk
#[derive(Clone)]
pub struct WikiEditAggregator {
    source: Arc<dyn RevisionSource>,
    annotator: SentimentAnnotator,
    cache: Option<PathBuf>,
    progress: bool,
}

impl WikiEditAggregator {
    /// Create an aggregator. With a cache path, a previously saved series is always reused.
    pub fn new(
        source: Arc<dyn RevisionSource>,
        annotator: SentimentAnnotator,
        cache: Option<PathBuf>,
    ) -> WikiEditAggregator {
        WikiEditAggregator {
            source,
            annotator,
            cache,
            progress: false,
        }
    }
    /// Show a progress bar while scoring revisions
    pub fn with_progress(mut self, progress: bool) -> WikiEditAggregator {
        self.progress = progress;
        self
    }
    /// The cache file in use, if any
    pub fn cache(&self) -> Option<&Path> {
        self.cache.as_deref()
    }
    /// Score revisions with the annotator
    pub async fn score(&self, revisions: &[Revision]) -> Vec<ScoredRevision> {
        let bar = if self.progress {
            let bar = ProgressBar::new(revisions.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar().template("Scoring edits: {wide_bar} {pos}/{len}"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        let mut scored = Vec::with_capacity(revisions.len());
        for revision in revisions {
            scored.push(ScoredRevision {
                date: revision.timestamp.date_naive(),
                sentiment: self.annotator.score(&revision.comment).await,
            });
            bar.inc(1);
        }
        bar.finish_and_clear();
        scored
    }
    /// Load the cached series for `page`, or fetch, score, aggregate and cache it.
    ///
    /// A cached series is returned as-is, however stale: delete the cache file to refresh it.
    pub async fn load_or_build(
        &self,
        page: &str,
        max_revisions: usize,
        today: NaiveDate,
    ) -> Result<Vec<DailyEditStats>> {
        if let Some(cache) = self.cache.as_deref() {
            if cache.exists() {
                let stats = read_daily_stats(File::open(cache)?)?;
                info!(page, days = stats.len(), cache = %cache.display(), "loaded cached wiki series");
                return Ok(stats);
            }
        }
        let revisions = self.source.revisions(page, max_revisions).await?;
        if revisions.is_empty() {
            return Err(Error::DataUnavailable {
                ticker: page.to_owned(),
            });
        }
        info!(page, revisions = revisions.len(), "scoring revisions");
        let scored = self.score(&revisions).await;
        let stats = aggregate(&scored, today);
        if let Some(cache) = self.cache.as_deref() {
            if let Some(dir) = cache.parent() {
                std::fs::create_dir_all(dir)?;
            }
            write_daily_stats(File::create(cache)?, &stats)?;
            info!(page, days = stats.len(), cache = %cache.display(), "cached wiki series");
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn scored(d: u32, sentiment: f64) -> ScoredRevision {
        ScoredRevision {
            date: day(d),
            sentiment,
        }
    }

    #[test]
    fn dense_daily_range_through_today() {
        let revisions = [scored(3, 0.5), scored(1, -0.5), scored(3, -0.25), scored(6, 1.0)];
        let stats = daily_stats(&revisions, day(10));
        assert_eq!(stats.len(), 10);
        for (i, stats) in stats.iter().enumerate() {
            assert_eq!(stats.date, day(i as u32 + 1));
        }
        assert_eq!(stats[0].edit_count, 1.0);
        assert_eq!(stats[0].neg_sentiment_ratio, 1.0);
        assert_eq!(stats[1], DailyEditStats::empty(day(2)));
        assert_eq!(stats[2].edit_count, 2.0);
        assert_eq!(stats[2].sentiment_mean, 0.125);
        assert_eq!(stats[2].neg_sentiment_ratio, 0.5);
        assert_eq!(stats[9], DailyEditStats::empty(day(10)));
    }

    #[test]
    fn zero_scores_are_not_negative() {
        let stats = daily_stats(&[scored(1, 0.0), scored(1, -0.1)], day(1));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].neg_sentiment_ratio, 0.5);
    }

    #[test]
    fn today_before_last_revision_keeps_all_revisions() {
        let stats = daily_stats(&[scored(1, 0.0), scored(5, 0.0)], day(2));
        assert_eq!(stats.len(), 5);
    }

    #[test]
    fn empty_input_gives_empty_series() {
        assert!(aggregate(&[], day(1)).is_empty());
    }

    #[test]
    fn smoothing_is_defined_from_the_first_row() {
        let revisions = [scored(1, 1.0), scored(1, 1.0), scored(3, -1.0)];
        let stats = aggregate(&revisions, day(4));
        assert_eq!(stats.len(), 4);
        assert!(stats.iter().all(DailyEditStats::is_complete));
        assert_eq!(stats[0].edit_count, 2.0);
        assert_eq!(stats[1].edit_count, 1.0);
        assert_eq!(stats[2].edit_count, 1.0);
        assert_eq!(stats[2].sentiment_mean, 0.0);
        assert!((stats[3].neg_sentiment_ratio - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rolling_window_is_thirty_days() {
        let revisions: Vec<_> = (1..=31).map(|d| scored(d, 0.0)).collect();
        let mut stats = daily_stats(&revisions, day(31));
        stats[0].edit_count = 31.0;
        let smoothed = smooth(&stats, ROLLING_WINDOW);
        assert_eq!(smoothed[29].edit_count, 2.0);
        assert_eq!(smoothed[30].edit_count, 1.0);
    }

    #[test]
    fn cache_roundtrip() {
        let stats = aggregate(&[scored(1, 0.5), scored(3, -0.5)], day(3));
        let mut buf = Vec::new();
        assert_eq!(write_daily_stats(&mut buf, &stats).unwrap(), 3);
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("date,edit_count,sentiment_mean,neg_sentiment_ratio"));
        assert_eq!(read_daily_stats(&buf[..]).unwrap(), stats);
    }
}
