/*!
An offline, word-list sentiment classifier tuned for edit summaries
*/
use super::{Classification, Label, SentimentClassifier};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Words which flip the polarity of the word after them
const NEGATIONS: &[&str] = &["not", "no", "never", "without", "dont", "isnt", "wasnt"];

const POSITIVE: &[(&str, f64)] = &[
    ("add", 0.3),
    ("added", 0.3),
    ("adding", 0.3),
    ("adoption", 0.5),
    ("better", 0.5),
    ("cite", 0.3),
    ("citation", 0.3),
    ("clarify", 0.4),
    ("clarified", 0.4),
    ("cleanup", 0.3),
    ("copyedit", 0.3),
    ("correct", 0.4),
    ("corrected", 0.4),
    ("expand", 0.5),
    ("expanded", 0.5),
    ("fix", 0.4),
    ("fixed", 0.4),
    ("good", 0.5),
    ("great", 0.7),
    ("growth", 0.5),
    ("improve", 0.6),
    ("improved", 0.6),
    ("improvement", 0.6),
    ("rally", 0.6),
    ("record", 0.3),
    ("sourced", 0.3),
    ("success", 0.6),
    ("thanks", 0.6),
    ("update", 0.3),
    ("updated", 0.3),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("bad", 0.5),
    ("ban", 0.5),
    ("banned", 0.5),
    ("bias", 0.5),
    ("biased", 0.5),
    ("broken", 0.4),
    ("collapse", 0.7),
    ("crash", 0.6),
    ("delete", 0.3),
    ("deleted", 0.3),
    ("dispute", 0.4),
    ("disputed", 0.4),
    ("error", 0.3),
    ("fraud", 0.8),
    ("hack", 0.6),
    ("hacked", 0.6),
    ("incorrect", 0.4),
    ("misleading", 0.5),
    ("pov", 0.3),
    ("remove", 0.3),
    ("removed", 0.3),
    ("revert", 0.6),
    ("reverted", 0.6),
    ("rv", 0.5),
    ("rvv", 0.8),
    ("scam", 0.8),
    ("spam", 0.8),
    ("undid", 0.6),
    ("undo", 0.5),
    ("unsourced", 0.4),
    ("vandal", 0.9),
    ("vandalism", 1.0),
    ("wrong", 0.5),
];

/// Classifies text by summing the signed weights of known words
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    weights: HashMap<&'static str, f64>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconClassifier {
    /// Create a classifier with the built-in word lists
    pub fn new() -> LexiconClassifier {
        let positive = POSITIVE.iter().map(|(word, weight)| (*word, *weight));
        let negative = NEGATIVE.iter().map(|(word, weight)| (*word, -*weight));
        LexiconClassifier {
            weights: positive.chain(negative).collect(),
        }
    }
    /// The raw polarity of a text, unbounded
    pub fn polarity(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let mut polarity = 0.0;
        let mut negate = false;
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            if NEGATIONS.contains(&word) {
                negate = true;
                continue;
            }
            if let Some(weight) = self.weights.get(word) {
                polarity += if negate { -weight } else { *weight };
            }
            negate = false;
        }
        polarity
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let polarity = self.polarity(text);
        let label = if polarity < 0.0 {
            Label::Negative
        } else {
            Label::Positive
        };
        Ok(Classification {
            label,
            score: polarity.tanh().abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classifies_edit_summaries() {
        let lexicon = LexiconClassifier::new();
        let vandalism = lexicon.classify("Reverted vandalism by 1.2.3.4").await.unwrap();
        assert_eq!(vandalism.label, Label::Negative);
        assert!(vandalism.score > 0.5);
        let copyedit = lexicon.classify("copyedit, improved lead").await.unwrap();
        assert_eq!(copyedit.label, Label::Positive);
        assert!(copyedit.signed() > 0.0);
        let unknown = lexicon.classify("Bitcoin").await.unwrap();
        assert_eq!(unknown.signed(), 0.0);
    }

    #[test]
    fn negation_flips_the_next_word() {
        let lexicon = LexiconClassifier::new();
        assert!(lexicon.polarity("not good") < 0.0);
        assert!(lexicon.polarity("not a good") > 0.0);
    }
}
