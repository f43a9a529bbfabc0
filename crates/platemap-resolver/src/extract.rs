//! Structured extraction: free text in, tentative descriptor out.
//!
//! Sends the raw user input to a generative text model with a fixed
//! instruction prompt and worked examples, then interprets the reply as an
//! [`ExtractedDescriptor`]. Models sometimes fence structured output in
//! markdown, so the reply is stripped of decorative wrapping first. With no
//! model credential configured the extractor degrades to a deterministic
//! fallback, guaranteeing the pipeline always produces something.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::types::{Confidence, ExtractedDescriptor};

const MODEL: &str = "gemini-2.0-flash";

const INSTRUCTIONS: &str = r#"You extract restaurant information from user input. The input may be a restaurant name, a social media link, or a casual description.

Reply with ONLY one valid JSON object with these fields:
- name: the restaurant name (required)
- cuisine: cuisine type when stated or clearly inferable (optional)
- city: city or location when stated (optional)
- address: full street address when present (optional)
- socialLink: the social media URL when the input contains one (optional)
- confidence: "high" for a clear restaurant name, "medium" when inferred, "low" when uncertain

When the input is ambiguous or could mean several places, set confidence to "low".

Examples:
- Input: "Vitrina Tel Aviv" -> {"name": "Vitrina", "city": "Tel Aviv", "confidence": "high"}
- Input: "that sushi place near the beach" -> {"name": "Unknown Sushi Restaurant", "cuisine": "Japanese", "confidence": "low"}
- Input: "https://instagram.com/vitrina_tlv" -> {"name": "Vitrina TLV", "socialLink": "https://instagram.com/vitrina_tlv", "confidence": "medium"}

Reply with the JSON object only, no markdown formatting and no explanation."#;

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Client for the generative extraction endpoint.
#[derive(Clone)]
pub struct Extractor {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
}

impl Extractor {
    /// Builds the extractor from config.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Http`] if the HTTP client cannot be built, or
    /// [`ResolveError::Configuration`] if the base URL is invalid.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(config.extract_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let raw = format!(
            "{}/v1beta/models/{MODEL}:generateContent",
            config.extract_base_url.trim_end_matches('/')
        );
        let endpoint = Url::parse(&raw).map_err(|e| {
            ResolveError::Configuration(format!("invalid extraction base URL '{raw}': {e}"))
        })?;
        Ok(Self {
            client,
            api_key: config.model_api_key.clone(),
            endpoint,
        })
    }

    /// Turns free text into a tentative descriptor.
    ///
    /// Without a credential, returns the deterministic fallback (trimmed
    /// input as the name, `medium` confidence) with zero network calls.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Extraction`] if the input is empty or the model
    ///   reply does not parse as a descriptor. Never retried.
    /// - [`ResolveError::Http`] / [`ResolveError::Status`] on transport
    ///   failures.
    pub async fn extract(&self, text: &str) -> Result<ExtractedDescriptor, ResolveError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::Extraction {
                reason: "empty input".to_owned(),
            });
        }

        let Some(api_key) = &self.api_key else {
            tracing::debug!("no model credential configured, using deterministic extraction fallback");
            return Ok(ExtractedDescriptor {
                name: trimmed.to_owned(),
                cuisine: None,
                city: None,
                address: None,
                social_link: None,
                confidence: Confidence::Medium,
            });
        };

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", api_key);

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: format!("{INSTRUCTIONS}\n\nUser input: \"{trimmed}\""),
                }],
            }],
        };

        let response = self.client.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                status: status.as_u16(),
                context: "extraction service".to_owned(),
            });
        }

        let body = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| ResolveError::Deserialize {
                context: "extraction response envelope".to_owned(),
                source: e,
            })?;

        let reply = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or_default();
        if reply.is_empty() {
            return Err(ResolveError::Extraction {
                reason: "model returned no content".to_owned(),
            });
        }

        let descriptor: ExtractedDescriptor = serde_json::from_str(strip_fences(reply))
            .map_err(|e| ResolveError::Extraction {
                reason: format!("model output is not a descriptor: {e}"),
            })?;
        tracing::debug!(name = %descriptor.name, confidence = ?descriptor.confidence, "extracted descriptor");
        Ok(descriptor)
    }
}

/// Removes markdown code fences the model sometimes wraps its JSON in.
fn strip_fences(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```json") {
        t = rest;
    } else if let Some(rest) = t.strip_prefix("```") {
        t = rest;
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}
