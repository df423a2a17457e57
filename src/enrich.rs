//! Winner-image enrichment.
//!
//! Looking up a picture for the round winner is strictly best-effort:
//! a missing configuration, an exhausted quota or a network failure
//! must never hold up the game. Callers treat any error as "no image".

use async_trait::async_trait;
use serde::Deserialize;

pub type EnrichResult<T> = Result<T, EnrichError>;

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("image search request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// First matching image URL for the query, if any.
    async fn find_image(&self, query: &str) -> EnrichResult<Option<String>>;
}

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Custom Search image lookup.
pub struct GoogleImageSearch {
    http: reqwest::Client,
    api_key: String,
    cx: String,
}

impl GoogleImageSearch {
    pub fn new(api_key: String, cx: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            cx,
        }
    }

    /// Build the client from `IMAGE_SEARCH_API_KEY` / `IMAGE_SEARCH_CX`.
    /// Both must be set, otherwise enrichment stays disabled.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("IMAGE_SEARCH_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())?;
        let cx = std::env::var("IMAGE_SEARCH_CX")
            .ok()
            .filter(|s| !s.trim().is_empty())?;
        Some(Self::new(api_key, cx))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

#[async_trait]
impl ImageSearch for GoogleImageSearch {
    async fn find_image(&self, query: &str) -> EnrichResult<Option<String>> {
        let response = self
            .http
            .get(SEARCH_ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("searchType", "image"),
                ("num", "1"),
                ("safe", "active"),
                ("imgSize", "medium"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: SearchResponse = response.json().await?;
        Ok(body.items.into_iter().next().map(|item| item.link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_needs_both_variables() {
        std::env::remove_var("IMAGE_SEARCH_API_KEY");
        std::env::remove_var("IMAGE_SEARCH_CX");
        assert!(GoogleImageSearch::from_env().is_none());

        std::env::set_var("IMAGE_SEARCH_API_KEY", "key");
        assert!(GoogleImageSearch::from_env().is_none());

        std::env::set_var("IMAGE_SEARCH_CX", "cx");
        assert!(GoogleImageSearch::from_env().is_some());

        std::env::remove_var("IMAGE_SEARCH_API_KEY");
        std::env::remove_var("IMAGE_SEARCH_CX");
    }

    #[test]
    #[serial]
    fn blank_values_count_as_unset() {
        std::env::set_var("IMAGE_SEARCH_API_KEY", "  ");
        std::env::set_var("IMAGE_SEARCH_CX", "cx");
        assert!(GoogleImageSearch::from_env().is_none());

        std::env::remove_var("IMAGE_SEARCH_API_KEY");
        std::env::remove_var("IMAGE_SEARCH_CX");
    }
}
