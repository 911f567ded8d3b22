/*!
Sentiment scoring of edit comments

A `SentimentClassifier` labels text as positive or negative with a confidence. The
`SentimentAnnotator` turns that into a signed score and never fails: anything that goes wrong
scores as `NEUTRAL_SENTIMENT`.
*/
use crate::error::{Error, Result};
use crate::util::truncate_chars;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub mod huggingface;
pub mod lexicon;

pub use huggingface::HuggingFaceClassifier;
pub use lexicon::LexiconClassifier;

/// Comments are truncated to this many characters before scoring
pub const MAX_COMMENT_CHARS: usize = 512;

/// The score given to text which could not be scored
pub const NEUTRAL_SENTIMENT: f64 = 0.0;

/// A sentiment label
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Positive sentiment
    Positive,
    /// Negative sentiment
    Negative,
}

impl FromStr for Label {
    type Err = Error;
    fn from_str(s: &str) -> Result<Label> {
        match s.trim().to_uppercase().as_str() {
            "POSITIVE" | "POS" | "LABEL_1" => Ok(Label::Positive),
            "NEGATIVE" | "NEG" | "LABEL_0" => Ok(Label::Negative),
            other => Err(Error::Scoring(format!("unknown sentiment label {:?}", other))),
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Label::Positive => write!(f, "POSITIVE"),
            Label::Negative => write!(f, "NEGATIVE"),
        }
    }
}

/// The output of a classifier
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The predicted label
    pub label: Label,
    /// The confidence of the label, in `[0, 1]`
    pub score: f64,
}

impl Classification {
    /// The signed score: the confidence, negated for negative labels
    pub fn signed(&self) -> f64 {
        match self.label {
            Label::Positive => self.score,
            Label::Negative => -self.score,
        }
    }
}

/// A text sentiment classifier
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classify a piece of text
    async fn classify(&self, text: &str) -> Result<Classification>;
}

/// Scores revision comments in `[-1, 1]`
#[derive(Clone)]
pub struct SentimentAnnotator {
    classifier: Arc<dyn SentimentClassifier>,
}

impl SentimentAnnotator {
    /// Create an annotator over a classifier
    pub fn new(classifier: Arc<dyn SentimentClassifier>) -> SentimentAnnotator {
        SentimentAnnotator { classifier }
    }
    /// Score a comment, truncated to `MAX_COMMENT_CHARS`. Failures score `NEUTRAL_SENTIMENT`.
    pub async fn score(&self, text: &str) -> f64 {
        match self.try_score(text).await {
            Ok(score) => score,
            Err(err) => {
                debug!(error = %err, "scoring failed, using neutral sentiment");
                NEUTRAL_SENTIMENT
            }
        }
    }
    /// Score a comment, truncated to `MAX_COMMENT_CHARS`, reporting failures
    pub async fn try_score(&self, text: &str) -> Result<f64> {
        if text.trim().is_empty() {
            return Err(Error::Scoring("empty comment".to_owned()));
        }
        let text = truncate_chars(text, MAX_COMMENT_CHARS);
        let classification = self.classifier.classify(text).await?;
        let score = classification.signed();
        if !score.is_finite() {
            return Err(Error::Scoring(format!("non-finite score {}", score)));
        }
        Ok(score.max(-1.0).min(1.0))
    }
}
