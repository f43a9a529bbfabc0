//! Input resolution and enrichment pipeline for restaurant records.
//!
//! Turns minimal free-text input — a name, a social-media link, a casual
//! description — into a structured record with canonical name, address,
//! coordinates, and (when discoverable) a reservation link. The pipeline
//! chains unreliable, rate-limited lookup stages: structured extraction via
//! a text model, web search, heuristic address mining and booking-link
//! selection over the results, and geocoding. Each stage degrades when its
//! service is unavailable, repeated lookups are served from in-process
//! caches, and transient failures are retried with bounded back-off.
//!
//! Persistence, rendering, and conversational front-ends are callers'
//! concerns: callers pass text to [`Resolver::resolve`] and receive either a
//! finished [`CandidateRecord`] or a candidate list to disambiguate via
//! [`resolve_selection`].

pub mod booking;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod geocode;
pub mod mine;
pub mod pipeline;
pub mod search;
pub mod types;

mod retry;

pub use config::ResolverConfig;
pub use error::ResolveError;
pub use pipeline::{needs_selection, resolve_selection, Resolver};
pub use types::{
    CandidateRecord, Confidence, Coordinates, ExtractedDescriptor, Resolution, SearchHit,
};
