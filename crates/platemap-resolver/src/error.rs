use thiserror::Error;

/// Errors produced by the resolution pipeline.
///
/// Every variant is scoped to a single resolution request; nothing here is
/// fatal to the host process. Transient variants ([`ResolveError::Http`] and
/// 5xx [`ResolveError::Status`]) are the only ones the retry policy acts on.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Missing credential or otherwise unusable configuration. Never retried;
    /// stages with a fallback degrade instead of surfacing this.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The text model returned output that does not parse as a descriptor.
    /// Never retried — resending an identical prompt rarely fixes formatting.
    #[error("extraction failed: {reason}")]
    Extraction { reason: String },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP status. Retried only when `status` is a 5xx.
    #[error("unexpected HTTP status {status} from {context}")]
    Status { status: u16, context: String },

    /// The service answered 2xx but reported an application-level error in
    /// its payload.
    #[error("{context} error: {message}")]
    Api { context: String, message: String },

    /// The response body could not be deserialized into the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The geocoder returned zero results for the address. Terminal for that
    /// address — a deterministic geocoder cannot succeed on retry.
    #[error("no geocoding result for \"{address}\"")]
    GeocodeNotFound { address: String },

    /// A disambiguation selection index out of range for the candidate list.
    #[error("selection index {index} out of range for {count} candidates")]
    InvalidSelection { index: usize, count: usize },
}
