/*!
A [Hugging Face](https://huggingface.co/docs/api-inference) hosted text classification model
*/
use super::{Classification, SentimentClassifier};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The default model, an SST-2 fine-tuned DistilBERT
pub const DEFAULT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/distilbert-base-uncased-finetuned-sst-2-english";

/// A client for a hosted text classification model
#[derive(Debug, Clone)]
pub struct HuggingFaceClassifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    inputs: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct Scored {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Response {
    Nested(Vec<Vec<Scored>>),
    Flat(Vec<Scored>),
}

impl Response {
    /// The highest-scoring label
    fn best(self) -> Option<Scored> {
        let candidates = match self {
            Response::Nested(nested) => nested.into_iter().flatten().collect(),
            Response::Flat(flat) => flat,
        };
        candidates.into_iter().fold(None, |best: Option<Scored>, candidate| match best {
            Some(best) if best.score >= candidate.score => Some(best),
            _ => Some(candidate),
        })
    }
}

impl HuggingFaceClassifier {
    /// Create a client for a model endpoint, optionally authenticated with a bearer token
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<HuggingFaceClassifier> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HuggingFaceClassifier {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl SentimentClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let mut request = self
            .client
            .post(self.url.as_str())
            .json(&Request { inputs: text });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response: Response = request.send().await?.error_for_status()?.json().await?;
        let best = response
            .best()
            .ok_or_else(|| Error::Scoring("classifier returned no labels".to_owned()))?;
        Ok(Classification {
            label: best.label.parse()?,
            score: best.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_best_label() {
        let nested: Response = serde_json::from_str(
            r#"[[{"label":"NEGATIVE","score":0.9},{"label":"POSITIVE","score":0.1}]]"#,
        )
        .unwrap();
        let best = nested.best().unwrap();
        assert_eq!(best.label, "NEGATIVE");
        assert_eq!(best.score, 0.9);
        let flat: Response = serde_json::from_str(r#"[{"label":"POSITIVE","score":0.6}]"#).unwrap();
        assert_eq!(flat.best().unwrap().label, "POSITIVE");
        let empty: Response = serde_json::from_str("[]").unwrap();
        assert!(empty.best().is_none());
    }
}
