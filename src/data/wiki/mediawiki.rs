/*!
[MediaWiki](https://www.mediawiki.org/wiki/API:Revisions) revision listing
*/
use super::{Revision, RevisionSource};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// The English Wikipedia API endpoint
pub const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";

/// The most revisions the API hands out per request
pub const MAX_BATCH: usize = 500;

/// A MediaWiki API client
#[derive(Debug, Clone)]
pub struct MediaWiki {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "continue")]
    cont: Option<Continue>,
    query: Option<Query>,
}

#[derive(Debug, Deserialize)]
struct Continue {
    rvcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    revisions: Vec<ApiRevision>,
}

#[derive(Debug, Deserialize)]
struct ApiRevision {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    comment: String,
}

impl MediaWiki {
    /// Create a client for an API endpoint with a request timeout
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<MediaWiki> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("coinburn/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(MediaWiki {
            client,
            api_url: api_url.into(),
        })
    }

    async fn batch(
        &self,
        page: &str,
        limit: usize,
        rvcontinue: Option<&str>,
    ) -> Result<QueryResponse> {
        let limit = limit.to_string();
        let mut query = vec![
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("prop", "revisions"),
            ("rvprop", "timestamp|comment"),
            ("rvlimit", limit.as_str()),
            ("titles", page),
        ];
        if let Some(rvcontinue) = rvcontinue {
            query.push(("rvcontinue", rvcontinue));
        }
        let response: QueryResponse = self
            .client
            .get(self.api_url.as_str())
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl RevisionSource for MediaWiki {
    /// Page through revisions newest first. A failure after the first batch keeps what was
    /// already fetched.
    async fn revisions(&self, page: &str, limit: usize) -> Result<Vec<Revision>> {
        let mut revisions: Vec<Revision> = Vec::new();
        let mut rvcontinue: Option<String> = None;
        while revisions.len() < limit {
            let wanted = (limit - revisions.len()).min(MAX_BATCH);
            let response = match self.batch(page, wanted, rvcontinue.as_deref()).await {
                Ok(response) => response,
                Err(err) if !revisions.is_empty() => {
                    warn!(page, fetched = revisions.len(), error = %err, "revision fetch interrupted");
                    break;
                }
                Err(err) => return Err(err),
            };
            let batch = response
                .query
                .into_iter()
                .flat_map(|query| query.pages)
                .flat_map(|page| page.revisions)
                .map(|revision| Revision {
                    timestamp: revision.timestamp,
                    comment: revision.comment,
                });
            revisions.extend(batch);
            debug!(page, fetched = revisions.len(), "fetched revisions");
            rvcontinue = response.cont.and_then(|cont| cont.rvcontinue);
            if rvcontinue.is_none() {
                break;
            }
        }
        revisions.truncate(limit);
        Ok(revisions)
    }
}
