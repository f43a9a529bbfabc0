//! Integration tests for the resolution pipeline using wiremock HTTP mocks.
//!
//! One mock server per external service; the resolver is pointed at them via
//! the base-URL config knobs.

use std::time::Duration;

use platemap_resolver::extract::Extractor;
use platemap_resolver::geocode::GeocodeClient;
use platemap_resolver::search::SearchClient;
use platemap_resolver::{Resolution, ResolveError, Resolver, ResolverConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXTRACT_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";
const SEARCH_PATH: &str = "/search";
const GEOCODE_PATH: &str = "/maps/api/geocode/json";

fn test_config(extract: &str, search: &str, geocode: &str) -> ResolverConfig {
    ResolverConfig {
        model_api_key: Some("model-key".to_owned()),
        search_api_key: Some("search-key".to_owned()),
        geocode_api_key: Some("geocode-key".to_owned()),
        extract_base_url: extract.to_owned(),
        search_base_url: search.to_owned(),
        geocode_base_url: geocode.to_owned(),
        // Keep back-off imperceptible in tests.
        retry_base_delay: Duration::from_millis(1),
        ..ResolverConfig::default()
    }
}

/// Wraps `text` in the model service's response envelope.
fn model_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    })
}

#[tokio::test]
async fn search_returning_500_then_200_succeeds_after_exactly_two_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "answer": null,
            "results": [
                { "title": "t", "url": "https://example.com", "content": "c", "score": 0.9 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = SearchClient::new(&config).expect("client construction");
    let outcome = client.search("vitrina tel aviv").await.expect("should succeed after retry");
    assert_eq!(outcome.hits.len(), 1);
}

#[tokio::test]
async fn all_500_search_fails_after_the_retry_ceiling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = SearchClient::new(&config).expect("client construction");
    let err = client.search("vitrina tel aviv").await.unwrap_err();
    assert!(matches!(err, ResolveError::Status { status: 500, .. }));
}

#[tokio::test]
async fn search_4xx_fails_immediately_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = SearchClient::new(&config).expect("client construction");
    let err = client.search("vitrina tel aviv").await.unwrap_err();
    assert!(matches!(err, ResolveError::Status { status: 401, .. }));
}

#[tokio::test]
async fn identical_searches_issue_exactly_one_outbound_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "title": "t", "url": "https://example.com", "content": "c", "score": 0.9 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = SearchClient::new(&config).expect("client construction");
    let first = client.search("Vitrina Tel Aviv").await.unwrap();
    // Same query modulo normalization — must be served from cache.
    let second = client.search("vitrina, tel aviv!").await.unwrap();
    assert_eq!(first.hits, second.hits);
}

#[tokio::test]
async fn empty_search_result_is_a_valid_cacheable_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = SearchClient::new(&config).expect("client construction");
    let first = client.search("nowhere at all").await.unwrap();
    let second = client.search("nowhere at all").await.unwrap();
    assert!(first.hits.is_empty());
    assert!(second.hits.is_empty());
}

#[tokio::test]
async fn cloned_client_shares_the_cache() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "title": "t", "url": "https://example.com", "content": "c", "score": 0.9 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = SearchClient::new(&config).expect("client construction");
    let clone = client.clone();
    let first = client.search("vitrina tel aviv").await.unwrap();
    // The clone must hit the shared cache, not the network (expect(1) above).
    let second = clone.search("vitrina tel aviv").await.unwrap();
    assert_eq!(first.hits, second.hits);
}

#[tokio::test]
async fn geocode_zero_results_is_not_found_with_no_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ZERO_RESULTS",
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = GeocodeClient::new(&config).expect("client construction");
    let err = client.geocode("Nowhere 1, Atlantis").await.unwrap_err();
    assert!(matches!(err, ResolveError::GeocodeNotFound { .. }));
}

#[tokio::test]
async fn geocode_retries_transient_failures_and_caches_the_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{
                "geometry": { "location": { "lat": 32.07, "lng": 34.78 } },
                "formatted_address": "Dizengoff St 99, Tel Aviv-Yafo, Israel",
                "place_id": "venue-1",
                "types": ["street_address"]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), &server.uri(), &server.uri());
    let client = GeocodeClient::new(&config).expect("client construction");
    let first = client.geocode("Dizengoff 99, Tel Aviv").await.unwrap();
    assert!((first.coordinates.lat - 32.07).abs() < f64::EPSILON);
    // Second lookup of the same address must come from cache (expect(1) above).
    let second = client.geocode("dizengoff 99, tel aviv").await.unwrap();
    assert_eq!(second.formatted_address, first.formatted_address);
}

#[tokio::test]
async fn fenced_and_unfenced_model_replies_parse_identically() {
    let descriptor_json = r#"{"name": "Vitrina", "city": "Tel Aviv", "confidence": "high"}"#;

    let plain_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXTRACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(descriptor_json)))
        .mount(&plain_server)
        .await;

    let fenced_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXTRACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(&format!(
            "```json\n{descriptor_json}\n```"
        ))))
        .mount(&fenced_server)
        .await;

    let plain = Extractor::new(&test_config(&plain_server.uri(), "http://x", "http://x"))
        .expect("extractor construction")
        .extract("Vitrina Tel Aviv")
        .await
        .unwrap();
    let fenced = Extractor::new(&test_config(&fenced_server.uri(), "http://x", "http://x"))
        .expect("extractor construction")
        .extract("Vitrina Tel Aviv")
        .await
        .unwrap();

    assert_eq!(plain, fenced);
    assert_eq!(plain.name, "Vitrina");
    assert_eq!(plain.city.as_deref(), Some("Tel Aviv"));
}

#[tokio::test]
async fn garbage_model_output_is_an_extraction_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXTRACT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(model_reply("Sorry, I cannot help with that.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let extractor = Extractor::new(&test_config(&server.uri(), "http://x", "http://x"))
        .expect("extractor construction");
    let err = extractor.extract("Vitrina").await.unwrap_err();
    assert!(matches!(err, ResolveError::Extraction { .. }));
}

#[tokio::test]
async fn resolve_returns_enriched_record_end_to_end() {
    let extract_server = MockServer::start().await;
    let search_server = MockServer::start().await;
    let geocode_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(EXTRACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(
            r#"{"name": "Sushi Place", "city": "Tokyo", "confidence": "high"}"#,
        )))
        .expect(1)
        .mount(&extract_server)
        .await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "answer": null,
            "results": [{
                "title": "Sushi Place",
                "url": "https://tabit.cloud/sushi-place",
                "content": "Find Sushi Place at 4 Hashalom Road, Tel Aviv. Open daily.",
                "score": 0.95
            }]
        })))
        .expect(1)
        .mount(&search_server)
        .await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{
                "geometry": { "location": { "lat": 35.6, "lng": 139.7 } },
                "formatted_address": "4 Hashalom Road, Tel Aviv, Israel",
                "place_id": "venue-42",
                "types": ["street_address"]
            }]
        })))
        .expect(1)
        .mount(&geocode_server)
        .await;

    let resolver = Resolver::new(test_config(
        &extract_server.uri(),
        &search_server.uri(),
        &geocode_server.uri(),
    ))
    .expect("resolver construction");

    let resolution = resolver.resolve("Sushi Place in Tokyo").await.unwrap();
    let Resolution::Resolved { record } = resolution else {
        panic!("expected resolved, got {resolution:?}");
    };
    assert_eq!(record.name, "Sushi Place");
    let coordinates = record.coordinates.expect("coordinates");
    assert!((coordinates.lat - 35.6).abs() < f64::EPSILON);
    assert!((coordinates.lng - 139.7).abs() < f64::EPSILON);
    assert_eq!(record.address.as_deref(), Some("4 Hashalom Road, Tel Aviv, Israel"));
    assert_eq!(record.booking_link.as_deref(), Some("https://tabit.cloud/sushi-place"));
    assert_eq!(record.place_id.as_deref(), Some("venue-42"));
}

#[tokio::test]
async fn low_confidence_is_ambiguous_and_never_geocodes() {
    let extract_server = MockServer::start().await;
    let search_server = MockServer::start().await;
    let geocode_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(EXTRACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(
            r#"{"name": "Unknown Sushi Restaurant", "cuisine": "Japanese", "confidence": "low"}"#,
        )))
        .mount(&extract_server)
        .await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "title": "Guide",
                "url": "https://example.com/guide",
                "content": "Try 99 Dizengoff St, Tel Aviv for sushi.",
                "score": 0.4
            }]
        })))
        .mount(&search_server)
        .await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geocode_server)
        .await;

    let resolver = Resolver::new(test_config(
        &extract_server.uri(),
        &search_server.uri(),
        &geocode_server.uri(),
    ))
    .expect("resolver construction");

    let resolution = resolver.resolve("that sushi place").await.unwrap();
    let Resolution::Ambiguous { candidates } = resolution else {
        panic!("expected ambiguous, got {resolution:?}");
    };
    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].coordinates.is_none(), "no geocoding before selection");
}

#[tokio::test]
async fn two_distinct_addresses_are_ambiguous_with_two_candidates() {
    let extract_server = MockServer::start().await;
    let search_server = MockServer::start().await;
    let geocode_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(EXTRACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(
            r#"{"name": "Vitrina", "city": "Tel Aviv", "confidence": "high"}"#,
        )))
        .mount(&extract_server)
        .await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "title": "Vitrina",
                    "url": "https://example.com/a",
                    "content": "The original branch: 99 Dizengoff St, Tel Aviv.",
                    "score": 0.9
                },
                {
                    "title": "Vitrina new branch",
                    "url": "https://example.com/b",
                    "content": "Now also at 12 Rothschild Blvd, Tel Aviv.",
                    "score": 0.8
                }
            ]
        })))
        .mount(&search_server)
        .await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geocode_server)
        .await;

    let resolver = Resolver::new(test_config(
        &extract_server.uri(),
        &search_server.uri(),
        &geocode_server.uri(),
    ))
    .expect("resolver construction");

    let resolution = resolver.resolve("Vitrina Tel Aviv").await.unwrap();
    let Resolution::Ambiguous { candidates } = resolution else {
        panic!("expected ambiguous, got {resolution:?}");
    };
    assert_eq!(candidates.len(), 2);
    assert_eq!(
        candidates[0].address.as_deref(),
        Some("99 Dizengoff St, Tel Aviv")
    );
    assert_eq!(
        candidates[1].address.as_deref(),
        Some("12 Rothschild Blvd, Tel Aviv")
    );
    assert!(candidates[1].name.starts_with("Vitrina ("));
}

#[tokio::test]
async fn search_failure_degrades_to_a_name_only_record() {
    let search_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&search_server)
        .await;

    let config = ResolverConfig {
        // No model credential: the deterministic extraction fallback runs.
        model_api_key: None,
        ..test_config("http://127.0.0.1:1", &search_server.uri(), "http://127.0.0.1:1")
    };
    let resolver = Resolver::new(config).expect("resolver construction");

    let resolution = resolver.resolve("Taizu").await.unwrap();
    let Resolution::Resolved { record } = resolution else {
        panic!("expected resolved, got {resolution:?}");
    };
    assert_eq!(record.name, "Taizu");
    assert!(record.address.is_none());
    assert!(record.coordinates.is_none());
    assert!(record.booking_link.is_none());
}
