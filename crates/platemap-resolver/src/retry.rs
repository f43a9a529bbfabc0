//! Bounded retry with exponential back-off, shared by the search and
//! geocode call sites.
//!
//! [`RetryPolicy::run`] wraps a fallible async operation and retries on
//! transient errors only. Back-off delays are real `tokio` sleeps, so an
//! abandoned request cancels cleanly instead of busy-waiting.

use std::future::Future;
use std::time::Duration;

use crate::error::ResolveError;

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses: transient server/infrastructure errors.
///
/// **Not retriable (hard stop):**
/// - 4xx statuses: the request itself is wrong; resending won't fix it.
/// - [`ResolveError::Configuration`]: a missing credential never heals.
/// - [`ResolveError::Extraction`] / [`ResolveError::Deserialize`]:
///   malformed payloads; identical retries return identical bodies.
/// - [`ResolveError::GeocodeNotFound`]: a deterministic geocoder given an
///   unchanged query cannot succeed on retry.
pub(crate) fn is_retriable(err: &ResolveError) -> bool {
    match err {
        ResolveError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ResolveError::Status { status, .. } => *status >= 500,
        ResolveError::Configuration(_)
        | ResolveError::Extraction { .. }
        | ResolveError::Api { .. }
        | ResolveError::Deserialize { .. }
        | ResolveError::GeocodeNotFound { .. }
        | ResolveError::InvalidSelection { .. } => false,
    }
}

/// Retry budget shared by every external lookup stage.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Runs `operation` with up to `max_retries` additional attempts on
    /// transient errors.
    ///
    /// Back-off doubles per attempt (`base_delay × 2^(attempt−1)`), capped
    /// at 60 s, with ±25 % jitter.
    pub(crate) async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ResolveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResolveError>>,
    {
        const MAX_DELAY_MS: u64 = 60_000;
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(MAX_DELAY_MS);
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !is_retriable(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let computed = base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                    let capped = computed.min(MAX_DELAY_MS);
                    #[allow(
                        clippy::cast_possible_truncation,
                        clippy::cast_sign_loss,
                        clippy::cast_precision_loss
                    )]
                    let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms,
                        error = %err,
                        "transient lookup error, retrying after back-off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}
