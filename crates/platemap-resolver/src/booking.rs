//! Reservation link selection.
//!
//! Collects candidate URLs from search hits — a hit's own URL when its host
//! is on the reservation-platform allow-list, plus platform URLs mentioned
//! inside hit bodies — drops landing/aggregator pages, and scores the
//! survivors. Zero survivors is success with no best link, not a failure.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::types::{normalize_name, SearchHit};

struct Platform {
    domain: &'static str,
    name: &'static str,
    weight: i32,
}

/// Allow-list in priority order: primary local platforms outrank the
/// secondary ones, which outrank the international aggregators.
const PLATFORMS: &[Platform] = &[
    Platform { domain: "tabit.cloud", name: "Tabit", weight: 10 },
    Platform { domain: "tabitisrael.co.il", name: "Tabit", weight: 10 },
    Platform { domain: "ontopo.co.il", name: "Ontopo", weight: 8 },
    Platform { domain: "ontopo.com", name: "Ontopo", weight: 8 },
    Platform { domain: "opentable.com", name: "OpenTable", weight: 5 },
    Platform { domain: "resy.com", name: "Resy", weight: 5 },
    Platform { domain: "sevenrooms.com", name: "SevenRooms", weight: 4 },
    Platform { domain: "thefork.com", name: "TheFork", weight: 4 },
];

/// Path segments that mark a landing/aggregator page rather than one venue:
/// site chrome, category words, language/region codes, city slugs.
const GENERIC_PATH_TERMS: &[&str] = &[
    "search",
    "explore",
    "login",
    "signup",
    "restaurant",
    "restaurants",
    "cities",
    "regions",
    "area",
    "zone",
    "home",
    "main",
    "index",
    "about",
    "contact",
    "terms",
    "terms-of-use",
    "privacy",
    "collection",
    "collections",
    "category",
    "categories",
    "restaurant-collection",
    "restaurant-collections",
    "best-restaurants",
    "en",
    "he",
    "il",
    "tel-aviv",
    "jerusalem",
    "haifa",
    "herzliya",
    "netanya",
    "jaffa",
    "eilat",
];

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("URL pattern must compile"));

/// A surviving candidate link with its score and platform label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredLink {
    pub url: String,
    pub platform: &'static str,
    pub score: i32,
}

/// Selection result: every survivor, best first, plus the winner.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookingLinks {
    pub best_link: Option<String>,
    pub all_links: Vec<ScoredLink>,
}

/// Filters and scores reservation links from `hits`.
///
/// Deterministic over its input: idempotent and order-stable, with ties
/// broken by encounter order (the sort is stable).
#[must_use]
pub fn select(hits: &[SearchHit], restaurant_name: &str) -> BookingLinks {
    let mut seen: Vec<String> = Vec::new();
    let mut scored: Vec<ScoredLink> = Vec::new();

    for raw in candidate_urls(hits) {
        if seen.contains(&raw) {
            continue;
        }
        seen.push(raw.clone());

        let Ok(parsed) = Url::parse(&raw) else {
            continue;
        };
        let Some(platform) = platform_for(&parsed) else {
            continue;
        };
        if is_generic_link(&parsed) {
            continue;
        }
        scored.push(ScoredLink {
            score: score(&raw, restaurant_name, platform.weight),
            url: raw,
            platform: platform.name,
        });
    }

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    BookingLinks {
        best_link: scored.first().map(|link| link.url.clone()),
        all_links: scored,
    }
}

/// Candidate pool in encounter order: URLs mentioned in each hit's body,
/// then the hit's own URL.
fn candidate_urls(hits: &[SearchHit]) -> Vec<String> {
    let mut urls = Vec::new();
    for hit in hits {
        for found in URL_PATTERN.find_iter(&hit.content) {
            urls.push(found.as_str().to_owned());
        }
        urls.push(hit.url.clone());
    }
    urls
}

fn platform_for(url: &Url) -> Option<&'static Platform> {
    let host = url.host_str()?.to_lowercase();
    PLATFORMS.iter().find(|p| host.contains(p.domain))
}

/// A link is generic when its path is empty or root, or when every path
/// segment is a known generic term.
fn is_generic_link(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    if path.is_empty() || path == "/" {
        return true;
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    !segments.is_empty() && segments.iter().all(|seg| GENERIC_PATH_TERMS.contains(seg))
}

/// Base platform weight, plus a fixed bonus per restaurant-name segment the
/// URL contains (and again for the leading segment, usually the brand), less
/// a small penalty for tracking parameters.
fn score(url: &str, restaurant_name: &str, base_weight: i32) -> i32 {
    let mut score = base_weight;
    let lower_url = url.to_lowercase();

    let normalized = normalize_name(restaurant_name);
    let segments: Vec<&str> = normalized
        .split_whitespace()
        .filter(|s| s.chars().count() > 2)
        .collect();

    for segment in &segments {
        if lower_url.contains(segment) {
            score += 5;
        }
    }
    if let Some(first) = segments.first() {
        if lower_url.contains(first) {
            score += 5;
        }
    }
    if url.contains("utm_") {
        score -= 1;
    }
    score
}
