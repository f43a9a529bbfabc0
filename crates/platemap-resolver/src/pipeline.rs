//! Enrichment orchestration.
//!
//! Sequences extraction → search → mining/selection → geocoding and decides
//! whether caller-driven disambiguation is required. Strictly sequential per
//! request; independent requests share only the clients' caches. Stage-local
//! failures degrade (a partial record beats an opaque error); the only
//! failures surfaced to the caller are pre-search ones, where no usable name
//! exists yet.

use crate::booking;
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::extract::Extractor;
use crate::geocode::{clean_address, GeocodeClient};
use crate::mine;
use crate::search::{build_query, SearchClient, SearchOutcome};
use crate::types::{CandidateRecord, Confidence, ExtractedDescriptor, Resolution};

/// The single named ambiguity predicate: disambiguation is required when
/// extraction confidence is low (regardless of candidate count) or when more
/// than one structurally distinct address/link pairing was found.
#[must_use]
pub fn needs_selection(confidence: Confidence, candidate_count: usize) -> bool {
    confidence == Confidence::Low || candidate_count > 1
}

/// Pure continuation after disambiguation: picks one candidate, no network.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidSelection`] when `index` is out of range.
pub fn resolve_selection(
    candidates: &[CandidateRecord],
    index: usize,
) -> Result<CandidateRecord, ResolveError> {
    candidates
        .get(index)
        .cloned()
        .ok_or(ResolveError::InvalidSelection {
            index,
            count: candidates.len(),
        })
}

/// One resolution pipeline: owns the three external clients and their
/// caches. Construct once and share; independent requests may run
/// concurrently against the same instance, and clones share the clients'
/// caches.
#[derive(Clone)]
pub struct Resolver {
    config: ResolverConfig,
    extractor: Extractor,
    search: SearchClient,
    geocoder: GeocodeClient,
}

impl Resolver {
    /// Builds the pipeline from config.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Configuration`] for unusable base URLs or
    /// [`ResolveError::Http`] if an HTTP client cannot be constructed.
    /// Missing credentials are not errors here; they degrade per stage.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        Ok(Self {
            extractor: Extractor::new(&config)?,
            search: SearchClient::new(&config)?,
            geocoder: GeocodeClient::new(&config)?,
            config,
        })
    }

    /// Resolves free-text input into one best-effort record, or a candidate
    /// list when disambiguation is required.
    ///
    /// Every terminal success returns a [`CandidateRecord`] even with all
    /// enrichment fields empty; the minimum viable record is a name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Extraction`] when no descriptor can be
    /// produced from the input. Search and geocode failures degrade and are
    /// not surfaced.
    pub async fn resolve(&self, text: &str) -> Result<Resolution, ResolveError> {
        let descriptor = self.extractor.extract(text).await?;

        let query = build_query(&descriptor, &self.config.country);
        let outcome = match self.search.search(&query).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    query = %query,
                    error = %err,
                    "search stage failed, continuing without enrichment"
                );
                SearchOutcome::default()
            }
        };

        if outcome.hits.is_empty() && outcome.answer.is_none() {
            let record = self.base_record(&descriptor, None, None);
            if needs_selection(descriptor.confidence, 1) {
                tracing::info!(name = %descriptor.name, "no enrichment and low confidence, awaiting selection");
                return Ok(Resolution::Ambiguous {
                    candidates: vec![record],
                });
            }
            tracing::info!(name = %descriptor.name, "resolved without enrichment");
            return Ok(Resolution::Resolved { record });
        }

        // Two independent reducers over the same hit set.
        let answer = outcome.answer.as_deref();
        let mined = mine::mine(answer, &outcome.hits);
        let links = booking::select(&outcome.hits, &descriptor.name);
        let distinct = mine::mine_distinct(answer, &outcome.hits);

        let primary_address = mined.or_else(|| descriptor.address.clone());
        let mut candidates = vec![self.base_record(
            &descriptor,
            primary_address.clone(),
            links.best_link.clone(),
        )];
        for alternative in distinct.iter().skip(1) {
            candidates.push(CandidateRecord {
                name: format!(
                    "{} ({})",
                    descriptor.name,
                    alternative.split(',').next().unwrap_or(alternative).trim()
                ),
                address: Some(alternative.clone()),
                coordinates: None,
                booking_link: None,
                website: None,
                place_id: None,
            });
        }

        if needs_selection(descriptor.confidence, candidates.len()) {
            tracing::info!(
                name = %descriptor.name,
                candidates = candidates.len(),
                confidence = ?descriptor.confidence,
                "ambiguous, awaiting selection"
            );
            return Ok(Resolution::Ambiguous { candidates });
        }

        let mut record = candidates.remove(0);
        self.geocode_into(&mut record, &descriptor, primary_address.as_deref())
            .await;
        tracing::info!(
            name = %record.name,
            located = record.coordinates.is_some(),
            booking = record.booking_link.is_some(),
            "resolved"
        );
        Ok(Resolution::Resolved { record })
    }

    /// Final suspension point. Failures here never fail the record: a
    /// zero-result geocode is terminal for the address, a transport failure
    /// has already exhausted its retries, and a missing credential has no
    /// fallback. All three leave the record without coordinates.
    async fn geocode_into(
        &self,
        record: &mut CandidateRecord,
        descriptor: &ExtractedDescriptor,
        primary_address: Option<&str>,
    ) {
        let city = descriptor.city.as_deref();
        let (target, from_fallback) = match primary_address {
            Some(address) => (clean_address(address, city, &self.config.country), false),
            None => match city {
                Some(city) => (
                    format!("{}, {city}, {}", descriptor.name, self.config.country),
                    true,
                ),
                None => return,
            },
        };

        match self.geocoder.geocode(&target).await {
            Ok(geocoded) => {
                record.coordinates = Some(geocoded.coordinates);
                record.address = Some(geocoded.formatted_address.clone());
                // A name+city fallback often lands on the city itself;
                // attach the place id only for a confirmed venue. For a
                // mined address it is enough that the match is not generic.
                let keep_place_id = if from_fallback {
                    geocoded.is_venue_match()
                } else {
                    !geocoded.is_generic_match()
                };
                if keep_place_id {
                    record.place_id = geocoded.place_id;
                }
            }
            Err(ResolveError::GeocodeNotFound { address }) => {
                tracing::info!(address = %address, "geocoder found nothing, keeping record without coordinates");
            }
            Err(err) => {
                tracing::warn!(error = %err, "geocode stage failed, keeping record without coordinates");
            }
        }
    }

    fn base_record(
        &self,
        descriptor: &ExtractedDescriptor,
        address: Option<String>,
        booking_link: Option<String>,
    ) -> CandidateRecord {
        CandidateRecord {
            name: descriptor.name.clone(),
            address,
            coordinates: None,
            booking_link,
            website: descriptor.social_link.clone(),
            place_id: None,
        }
    }
}
