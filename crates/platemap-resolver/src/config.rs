//! Resolver configuration.
//!
//! Credentials for the three external services are read once at startup.
//! A missing credential degrades the corresponding stage rather than
//! failing construction: extraction falls back to a deterministic
//! descriptor, search and geocoding report a stage-local failure.

use std::time::Duration;

use crate::error::ResolveError;

const DEFAULT_EXTRACT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_SEARCH_BASE_URL: &str = "https://api.tavily.com";
const DEFAULT_GEOCODE_BASE_URL: &str = "https://maps.googleapis.com";

/// Tunables and credentials for one [`crate::Resolver`].
#[derive(Clone)]
pub struct ResolverConfig {
    /// Generative text model credential; `None` enables the deterministic
    /// extraction fallback.
    pub model_api_key: Option<String>,
    /// Web search credential; `None` disables enrichment.
    pub search_api_key: Option<String>,
    /// Geocoding credential; `None` disables coordinates.
    pub geocode_api_key: Option<String>,
    pub extract_base_url: String,
    pub search_base_url: String,
    pub geocode_base_url: String,
    /// Two-letter region bias sent to the geocoder.
    pub region_bias: String,
    /// Country name appended to addresses before geocoding and used as the
    /// search bias term when no city is known.
    pub country: String,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// `None` = cache entries persist for the process lifetime.
    pub cache_ttl: Option<Duration>,
    pub extract_timeout: Duration,
    pub search_timeout: Duration,
    pub geocode_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model_api_key: None,
            search_api_key: None,
            geocode_api_key: None,
            extract_base_url: DEFAULT_EXTRACT_BASE_URL.to_owned(),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_owned(),
            geocode_base_url: DEFAULT_GEOCODE_BASE_URL.to_owned(),
            region_bias: "il".to_owned(),
            country: "Israel".to_owned(),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1000),
            cache_ttl: None,
            extract_timeout: Duration::from_secs(15),
            search_timeout: Duration::from_secs(20),
            geocode_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverConfig")
            .field(
                "model_api_key",
                &self.model_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "geocode_api_key",
                &self.geocode_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("extract_base_url", &self.extract_base_url)
            .field("search_base_url", &self.search_base_url)
            .field("geocode_base_url", &self.geocode_base_url)
            .field("region_bias", &self.region_bias)
            .field("country", &self.country)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("cache_ttl", &self.cache_ttl)
            .field("extract_timeout", &self.extract_timeout)
            .field("search_timeout", &self.search_timeout)
            .field("geocode_timeout", &self.geocode_timeout)
            .finish()
    }
}

impl ResolverConfig {
    /// Loads configuration from environment variables already in the
    /// process. `.env` loading belongs at the binary edge.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Configuration`] if a numeric variable fails
    /// to parse. Missing credentials are not errors.
    pub fn from_env() -> Result<Self, ResolveError> {
        build_config(|key| std::env::var(key))
    }
}

/// Builds configuration from the provided env-var lookup, decoupled from the
/// real environment so tests can use a plain map.
pub(crate) fn build_config<F>(lookup: F) -> Result<ResolverConfig, ResolveError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let get = |key: &str| lookup(key).ok();
    let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());

    let parse_u64 = |key: &str, default: u64| -> Result<u64, ResolveError> {
        match get(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ResolveError::Configuration(format!("invalid value for {key}: {e}"))
            }),
        }
    };
    let parse_u32 = |key: &str, default: u32| -> Result<u32, ResolveError> {
        match get(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ResolveError::Configuration(format!("invalid value for {key}: {e}"))
            }),
        }
    };

    let defaults = ResolverConfig::default();

    // The model key historically lived under either name.
    let model_api_key = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_AI_API_KEY"));
    let search_api_key = get("TAVILY_API_KEY");
    let geocode_api_key = get("GOOGLE_MAPS_API_KEY");

    let cache_ttl = match parse_u64("PLATEMAP_CACHE_TTL_SECS", 0)? {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(ResolverConfig {
        model_api_key,
        search_api_key,
        geocode_api_key,
        extract_base_url: or_default("PLATEMAP_EXTRACT_BASE_URL", &defaults.extract_base_url),
        search_base_url: or_default("PLATEMAP_SEARCH_BASE_URL", &defaults.search_base_url),
        geocode_base_url: or_default("PLATEMAP_GEOCODE_BASE_URL", &defaults.geocode_base_url),
        region_bias: or_default("PLATEMAP_REGION_BIAS", &defaults.region_bias),
        country: or_default("PLATEMAP_COUNTRY", &defaults.country),
        max_retries: parse_u32("PLATEMAP_MAX_RETRIES", defaults.max_retries)?,
        retry_base_delay: Duration::from_millis(parse_u64(
            "PLATEMAP_RETRY_BASE_DELAY_MS",
            u64::try_from(defaults.retry_base_delay.as_millis()).unwrap_or(1000),
        )?),
        cache_ttl,
        extract_timeout: Duration::from_secs(parse_u64("PLATEMAP_EXTRACT_TIMEOUT_SECS", 15)?),
        search_timeout: Duration::from_secs(parse_u64("PLATEMAP_SEARCH_TIMEOUT_SECS", 20)?),
        geocode_timeout: Duration::from_secs(parse_u64("PLATEMAP_GEOCODE_TIMEOUT_SECS", 10)?),
    })
}
