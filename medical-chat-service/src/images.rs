use anyhow::{Context as _, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

/// Number of images returned for each search.
pub const IMAGE_RESULT_COUNT: usize = 3;

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[async_trait]
pub trait ImageLookup: Send + Sync {
    /// Returns the raw lookup result, expected to be a JSON array of URL strings.
    async fn lookup(&self, term: &str, count: usize) -> anyhow::Result<Value>;
}

/// Image lookup through the Google Custom Search JSON API.
pub struct GoogleImageSearch {
    http: reqwest::Client,
    api_key: Option<String>,
    engine_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    link: String,
}

impl GoogleImageSearch {
    pub fn new(http: reqwest::Client, api_key: Option<String>, engine_id: Option<String>) -> Self {
        Self {
            http,
            api_key,
            engine_id,
        }
    }

    pub fn from_config(http: reqwest::Client, config: &ServiceConfig) -> Self {
        Self::new(
            http,
            config.google_search_api_key.clone(),
            config.google_search_engine_id.clone(),
        )
    }
}

#[async_trait]
impl ImageLookup for GoogleImageSearch {
    async fn lookup(&self, term: &str, count: usize) -> anyhow::Result<Value> {
        let (Some(api_key), Some(engine_id)) = (&self.api_key, &self.engine_id) else {
            bail!("image search is not configured (GOOGLE_SEARCH_API_KEY / GOOGLE_SEARCH_ENGINE_ID)");
        };

        info!(term = %term, count, "Searching images");

        let num = count.to_string();
        let res = self
            .http
            .get(GOOGLE_SEARCH_URL)
            .query(&[
                ("key", api_key.as_str()),
                ("cx", engine_id.as_str()),
                ("q", term),
                ("searchType", "image"),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .context("image search request failed")?;

        if !res.status().is_success() {
            bail!("image search status {}", res.status());
        }

        let body: SearchResponse = res
            .json()
            .await
            .context("image search returned invalid JSON")?;
        let links = body.items.into_iter().map(|item| Value::String(item.link));
        Ok(Value::Array(links.collect()))
    }
}

/// Looks up `IMAGE_RESULT_COUNT` image URLs for `term`.
pub async fn search_images(lookup: &dyn ImageLookup, term: &str) -> Result<Vec<String>> {
    if term.trim().is_empty() {
        return Err(ServiceError::invalid("search term must not be empty"));
    }

    let raw = lookup.lookup(term, IMAGE_RESULT_COUNT).await?;
    let Value::Array(items) = raw else {
        warn!(term = %term, "Image lookup did not return a list");
        return Err(ServiceError::malformed("image lookup must return a list of URLs"));
    };

    items
        .into_iter()
        .take(IMAGE_RESULT_COUNT)
        .map(|item| match item {
            Value::String(url) => Ok(url),
            other => Err(ServiceError::malformed(format!(
                "image lookup returned a non-string entry: {other}"
            ))),
        })
        .collect()
}

/// Error-indicator URLs served in place of real results.
pub fn placeholder_urls(term: &str, count: usize) -> Vec<String> {
    let safe_term: String = term.replace(' ', "-").chars().take(20).collect();
    let safe_term = urlencoding::encode(&safe_term);
    (1..=count)
        .map(|n| format!("https://via.placeholder.com/150/FF0000/FFFFFF?text=Error+{n}+{safe_term}"))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct ScriptedImages {
        answer: std::result::Result<Value, String>,
        calls: AtomicUsize,
    }

    impl ScriptedImages {
        pub fn answering(answer: Value) -> Self {
            Self {
                answer: Ok(answer),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(reason: &str) -> Self {
            Self {
                answer: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageLookup for ScriptedImages {
        async fn lookup(&self, _term: &str, _count: usize) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map_err(|reason| anyhow::anyhow!(reason))
        }
    }
}
