//! Address mining from noisy bilingual prose.
//!
//! Recovers street addresses embedded in search-result text, in Hebrew or
//! English, without a dedicated NLP model. An ordered list of pattern rules
//! runs against the synthesized answer first, then each hit's title and
//! content in result order; the FIRST rule matching in the FIRST source
//! wins, with no cross-source scoring. That contract is load-bearing:
//! upgrading to best-of-all-matches changes disambiguation behavior.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{normalize_name, SearchHit};

/// Known city names accepted in English-script rules, alternation-ready.
const CITY_ALTERNATION: &str =
    "Tel Aviv|Jerusalem|Haifa|Herzliya|Netanya|Jaffa|Eilat|Ramat Gan|Rishon|Petah Tikva";

/// City tokens (both scripts) that make a digit-less match plausible.
const CITY_TOKENS: &[&str] = &[
    "tel aviv",
    "jerusalem",
    "haifa",
    "herzliya",
    "netanya",
    "jaffa",
    "eilat",
    "ramat gan",
    "rishon",
    "petah tikva",
    "תל אביב",
    "ירושלים",
    "חיפה",
    "הרצליה",
    "נתניה",
    "יפו",
    "אילת",
    "רמת גן",
    "ראשון",
    "פתח תקווה",
];

/// One independently testable mining rule: a name plus its extractor pattern.
/// Capture group 1 is the address.
pub struct AddressRule {
    pub name: &'static str,
    pattern: Regex,
}

impl AddressRule {
    /// Applies this rule to `text`, returning the trimmed address when the
    /// pattern matches and the match is plausible.
    #[must_use]
    pub fn apply(&self, text: &str) -> Option<String> {
        let captures = self.pattern.captures(text)?;
        let raw = captures
            .get(1)
            .map_or_else(|| captures.get(0).map_or("", |m| m.as_str()), |m| m.as_str());
        let address = raw.trim().trim_end_matches(',').trim().to_owned();
        plausible_address(&address).then_some(address)
    }
}

/// Ordered most → least specific. Hebrew rules first: the explicit
/// street-word prefix form is the strongest signal, and the generic rule
/// last so it only fires when nothing better did.
static RULES: LazyLock<Vec<AddressRule>> = LazyLock::new(|| {
    let rule = |name: &'static str, pattern: String| AddressRule {
        name,
        pattern: Regex::new(&pattern).expect("address rule pattern must compile"),
    };
    vec![
        rule(
            "hebrew-street-prefix",
            r"(?:רחוב|רח'|ברחוב)\s+([\x{0590}-\x{05FF}\s]+\s+\d+[^,]*(?:,\s*[\x{0590}-\x{05FF}\s]+)?)"
                .to_owned(),
        ),
        rule(
            "hebrew-name-first",
            r"([\x{0590}-\x{05FF}]{3,}\s+\d+\s*,\s*[\x{0590}-\x{05FF}\s]+)".to_owned(),
        ),
        rule(
            "english-number-first",
            format!(
                r"(?i)(\d+\s+[A-Za-z\s]+(?:Street|St|Road|Rd|Avenue|Ave|Boulevard|Blvd)[^,]*,\s*(?:{CITY_ALTERNATION}))"
            ),
        ),
        rule(
            "english-name-first",
            format!(r"(?i)([A-Za-z\s]{{5,}}\s+\d+[^,]*,\s*(?:{CITY_ALTERNATION}))"),
        ),
        rule(
            "generic-with-city",
            format!(
                r"(?i)([A-Za-z\x{{0590}}-\x{{05FF}}]+\s+\d+[^,]*,\s*(?:{CITY_ALTERNATION})[^.\n]*)"
            ),
        ),
    ]
});

/// The ordered rule list, for direct per-rule testing.
#[must_use]
pub fn rules() -> &'static [AddressRule] {
    &RULES
}

/// A candidate is plausible only when it carries a house number or names a
/// recognized city — this keeps venue and neighborhood names from being
/// misread as addresses.
#[must_use]
pub fn plausible_address(candidate: &str) -> bool {
    if candidate.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    let lower = candidate.to_lowercase();
    CITY_TOKENS.iter().any(|token| lower.contains(token))
}

/// First rule that matches in `text`, in rule order.
fn first_match(text: &str) -> Option<String> {
    RULES.iter().find_map(|rule| rule.apply(text))
}

/// Mines one best-effort address: the synthesized answer is consulted first,
/// then each hit's title+content in result order. No match is not an error —
/// the pipeline falls back to geocoding from name+city.
#[must_use]
pub fn mine(answer: Option<&str>, hits: &[SearchHit]) -> Option<String> {
    sources(answer, hits).find_map(|source| first_match(&source))
}

/// Per-source first matches, deduplicated by normalized form in encounter
/// order. More than one entry means structurally distinct addresses were
/// found and the caller must disambiguate.
#[must_use]
pub fn mine_distinct(answer: Option<&str>, hits: &[SearchHit]) -> Vec<String> {
    let mut seen = Vec::new();
    let mut distinct = Vec::new();
    for source in sources(answer, hits) {
        if let Some(address) = first_match(&source) {
            let key = normalize_name(&address);
            if !seen.contains(&key) {
                seen.push(key);
                distinct.push(address);
            }
        }
    }
    distinct
}

fn sources<'a>(
    answer: Option<&'a str>,
    hits: &'a [SearchHit],
) -> impl Iterator<Item = String> + 'a {
    answer
        .map(str::to_owned)
        .into_iter()
        .chain(hits.iter().map(|hit| format!("{} {}", hit.title, hit.content)))
}
