//! Geocoding: text address in, coordinates out.
//!
//! Wraps a Google-style geocoding service constrained to a fixed region
//! bias, with a per-address cache. Zero-result responses are a defined
//! `NotFound` failure and are never retried; only transport-level failures
//! go through the shared back-off policy.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::cache::Cache;
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::retry::RetryPolicy;
use crate::types::Coordinates;

/// One resolved address.
#[derive(Debug, Clone)]
pub struct GeocodedAddress {
    pub coordinates: Coordinates,
    pub formatted_address: String,
    pub place_id: Option<String>,
    /// Provider result types, used to tell venue-level matches from
    /// city-level ones.
    pub types: Vec<String>,
}

impl GeocodedAddress {
    /// True when the match is a city or district rather than a venue.
    /// A generic match's place id must not be attached to a record.
    #[must_use]
    pub fn is_generic_match(&self) -> bool {
        self.types.iter().any(|t| {
            t == "locality" || t == "administrative_area_level_1" || t == "political"
        })
    }

    /// True when the provider tagged the match as an actual establishment.
    #[must_use]
    pub fn is_venue_match(&self) -> bool {
        self.types.iter().any(|t| {
            t == "establishment" || t == "point_of_interest" || t == "food" || t == "restaurant"
        })
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
    formatted_address: String,
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct Geometry {
    location: Coordinates,
}

/// Cached, retrying client for the geocoding service. Cloning is cheap
/// and clones share one cache.
#[derive(Clone)]
pub struct GeocodeClient {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
    region: String,
    cache: Arc<Cache<GeocodedAddress>>,
    retry: RetryPolicy,
}

impl GeocodeClient {
    /// Builds the geocode client from config.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Http`] if the HTTP client cannot be built, or
    /// [`ResolveError::Configuration`] if the base URL is invalid.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(config.geocode_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let raw = format!(
            "{}/maps/api/geocode/json",
            config.geocode_base_url.trim_end_matches('/')
        );
        let endpoint = Url::parse(&raw).map_err(|e| {
            ResolveError::Configuration(format!("invalid geocode base URL '{raw}': {e}"))
        })?;
        Ok(Self {
            client,
            api_key: config.geocode_api_key.clone(),
            endpoint,
            region: config.region_bias.clone(),
            cache: Arc::new(Cache::new(config.cache_ttl)),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay,
            },
        })
    }

    /// Resolves `address` to coordinates, serving repeats from cache. The
    /// cache key is the exact (trimmed, lowercased) address string.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Configuration`] when no geocode credential is set.
    /// - [`ResolveError::GeocodeNotFound`] on a zero-result response;
    ///   terminal for the address, never retried.
    /// - [`ResolveError::Status`] / [`ResolveError::Http`] once the retry
    ///   budget is exhausted.
    pub async fn geocode(&self, address: &str) -> Result<GeocodedAddress, ResolveError> {
        let cache_key = address.trim().to_lowercase();
        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!(address, "geocode cache hit");
            return Ok(cached);
        }

        let Some(api_key) = &self.api_key else {
            return Err(ResolveError::Configuration(
                "geocode API key not configured".to_owned(),
            ));
        };

        let geocoded = self
            .retry
            .run(|| self.geocode_once(api_key, address))
            .await?;
        tracing::debug!(
            address,
            formatted = %geocoded.formatted_address,
            "geocode completed"
        );
        self.cache.insert(cache_key, geocoded.clone());
        Ok(geocoded)
    }

    async fn geocode_once(
        &self,
        api_key: &str,
        address: &str,
    ) -> Result<GeocodedAddress, ResolveError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("address", address)
            .append_pair("region", &self.region)
            .append_pair("key", api_key);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                status: status.as_u16(),
                context: "geocode service".to_owned(),
            });
        }

        let body = response.text().await?;
        let parsed: GeocodeResponse =
            serde_json::from_str(&body).map_err(|e| ResolveError::Deserialize {
                context: format!("geocode({address})"),
                source: e,
            })?;

        if parsed.status != "OK" || parsed.results.is_empty() {
            return Err(ResolveError::GeocodeNotFound {
                address: address.to_owned(),
            });
        }

        let first = parsed.results.into_iter().next().ok_or_else(|| {
            ResolveError::GeocodeNotFound {
                address: address.to_owned(),
            }
        })?;
        Ok(GeocodedAddress {
            coordinates: first.geometry.location,
            formatted_address: first.formatted_address,
            place_id: first.place_id,
            types: first.types,
        })
    }
}

/// Prepares a mined address for geocoding: collapses whitespace, cuts the
/// trailing descriptive sentences search snippets drag along, and appends
/// the known city and country when absent — raising the odds of a single
/// confident result.
#[must_use]
pub fn clean_address(address: &str, city: Option<&str>, country: &str) -> String {
    let mut cleaned = address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    // Anything after the first sentence is description, not address.
    if let Some(idx) = noise_offset(&cleaned) {
        if idx > 0 {
            cleaned.truncate(idx);
            cleaned = cleaned.trim().to_owned();
        }
    }
    cleaned = cleaned.trim_end_matches('.').trim().to_owned();

    let lower = cleaned.to_lowercase();
    if let Some(city) = city {
        if !lower.contains(&city.to_lowercase()) {
            cleaned = format!("{cleaned}, {city}");
        }
    }
    if !lower.contains(&country.to_lowercase()) {
        cleaned = format!("{cleaned}, {country}");
    }
    cleaned
}

/// Byte offset of the first trailing-noise marker: a period followed by a
/// booking/contact phrase, or any second sentence.
fn noise_offset(text: &str) -> Option<usize> {
    use std::sync::LazyLock;

    use regex::Regex;

    static NOISE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"\.\s*(?i:To book|It is known|It is currently|Book a table|Booking|Instagram|Call|Phone)",
        )
        .expect("noise pattern must compile")
    });
    static SENTENCE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\.\s*[A-Z]").expect("sentence pattern must compile"));

    let noise = NOISE.find(text).map(|m| m.start());
    let sentence = SENTENCE.find(text).map(|m| m.start());
    match (noise, sentence) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
