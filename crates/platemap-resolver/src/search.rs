//! Web search stage.
//!
//! Queries a search API for pages likely to expose an address or reservation
//! link for the restaurant. Results are cached per normalized query (an
//! empty result set is a valid, cacheable answer) and transient failures
//! are retried under the shared back-off policy.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::retry::RetryPolicy;
use crate::types::{normalize_name, ExtractedDescriptor, SearchHit};

/// One successful search response: synthesized short answer plus hits.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub answer: Option<String>,
    pub hits: Vec<SearchHit>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    max_results: u8,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Builds the outbound query from a descriptor: name, a fixed bias term
/// favoring pages that expose an address, and the city (falling back to the
/// configured country when the city is unknown).
#[must_use]
pub fn build_query(descriptor: &ExtractedDescriptor, country: &str) -> String {
    let scope = descriptor.city.as_deref().unwrap_or(country);
    format!("{} restaurant {scope} address", descriptor.name)
}

/// Cached, retrying client for the web search service. Cloning is cheap
/// and clones share one cache.
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
    cache: Arc<Cache<SearchOutcome>>,
    retry: RetryPolicy,
}

impl SearchClient {
    /// Builds the search client from config.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Http`] if the HTTP client cannot be built, or
    /// [`ResolveError::Configuration`] if the base URL is invalid.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(config.search_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let raw = format!("{}/search", config.search_base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&raw).map_err(|e| {
            ResolveError::Configuration(format!("invalid search base URL '{raw}': {e}"))
        })?;
        Ok(Self {
            client,
            api_key: config.search_api_key.clone(),
            endpoint,
            cache: Arc::new(Cache::new(config.cache_ttl)),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay,
            },
        })
    }

    /// Runs a search, serving repeats from cache.
    ///
    /// A cache hit issues no network call. On a miss: 5xx and network
    /// failures are retried with doubling back-off; 4xx and a missing
    /// credential fail immediately. Successful responses, empty ones
    /// included, are cached before return.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Configuration`] when no search credential is set.
    /// - [`ResolveError::Status`] / [`ResolveError::Http`] once the retry
    ///   budget is exhausted.
    /// - [`ResolveError::Deserialize`] if the response shape is wrong.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, ResolveError> {
        let cache_key = normalize_name(query);
        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!(query, "search cache hit");
            return Ok(cached);
        }

        let Some(api_key) = &self.api_key else {
            return Err(ResolveError::Configuration(
                "search API key not configured".to_owned(),
            ));
        };

        let outcome = self
            .retry
            .run(|| self.search_once(api_key, query))
            .await?;
        tracing::debug!(query, hits = outcome.hits.len(), "search completed");
        self.cache.insert(cache_key, outcome.clone());
        Ok(outcome)
    }

    async fn search_once(&self, api_key: &str, query: &str) -> Result<SearchOutcome, ResolveError> {
        let request = SearchRequest {
            api_key,
            query,
            search_depth: "advanced",
            include_answer: true,
            max_results: 5,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                status: status.as_u16(),
                context: "search service".to_owned(),
            });
        }
        let body = response.text().await?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| ResolveError::Deserialize {
                context: format!("search({query})"),
                source: e,
            })?;
        Ok(SearchOutcome {
            answer: parsed.answer.filter(|a| !a.is_empty()),
            hits: parsed.results,
        })
    }
}
