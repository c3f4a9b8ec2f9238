//! HTTP client for a hosted Gemini-style `generateContent` endpoint.

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::parse::parse_medicines;
use super::{ExtractionError, MedicineExtractor, RawMedicine};

/// Instruction sent alongside the document image.
const EXTRACTION_PROMPT: &str = "Extract every prescribed medicine from this prescription \
image and return ONLY a JSON array. Each element must have the keys: \
medicineName, dosage, frequency, duration, prescribedDate (YYYY-MM-DD), \
hospitalName. Use null for anything not present on the document.";

/// Client for the hosted extraction model.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Default hosted endpoint with a 60-second timeout.
    pub fn default_hosted(api_key: &str) -> Self {
        Self::new(
            "https://generativelanguage.googleapis.com",
            api_key,
            "gemini-1.5-flash",
            60,
        )
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData<'a>>,
}

#[derive(Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
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

impl MedicineExtractor for GeminiClient {
    fn extract(&self, image: &[u8], mime_type: &str) -> Result<Vec<RawMedicine>, ExtractionError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart {
                        text: Some(EXTRACTION_PROMPT),
                        inline_data: None,
                    },
                    RequestPart {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type,
                            data: encoded,
                        }),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.request_url())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ExtractionError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ExtractionError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    ExtractionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or_default();

        if text.is_empty() {
            tracing::warn!("Extraction model returned no text content");
            return Ok(Vec::new());
        }

        parse_medicines(text)
    }
}
