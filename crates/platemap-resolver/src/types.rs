//! Core data model for the resolution pipeline.
//!
//! All entities live entirely within one resolution call. The pipeline
//! persists nothing; storing a [`CandidateRecord`] is the caller's job.

use serde::{Deserialize, Serialize};

/// How sure the extractor is about the descriptor it produced.
///
/// `Low` forces downstream disambiguation regardless of candidate count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Tentative, unverified restaurant identity parsed from free text before
/// any external verification. Produced once per request and drives the
/// search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDescriptor {
    pub name: String,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, rename = "socialLink")]
    pub social_link: Option<String>,
    pub confidence: Confidence,
}

/// One external web search result. Ephemeral: lives for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

/// Latitude/longitude pair. Modeled as one struct so that both fields are
/// present or both absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A fully or partially enriched entry from one pipeline pass, not yet
/// confirmed by the user. Immutable once returned; the product's minimum
/// viable record is a name alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Provider place id, set only when the geocoder matched a specific
    /// venue rather than a city or district.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

impl CandidateRecord {
    /// A record carrying nothing but the name — the no-enrichment terminal.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            coordinates: None,
            booking_link: None,
            website: None,
            place_id: None,
        }
    }
}

/// Terminal outcome of a successful resolution pass.
///
/// `failed` from the external contract is the `Err` side of
/// `Result<Resolution, ResolveError>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Resolution {
    Resolved { record: CandidateRecord },
    Ambiguous { candidates: Vec<CandidateRecord> },
}

/// Normalizes a restaurant name for query keys and URL matching: lowercase,
/// non-alphanumeric runs collapsed to single spaces. Keeps non-Latin letters
/// so Hebrew names survive.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }
    out
}
