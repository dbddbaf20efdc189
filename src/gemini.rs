use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

const GEMINI_API_ROOT: &str = "https://generativelanguage.googleapis.com/v1beta";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

const SUPPORTED_ASPECT_RATIOS: [&str; 7] = ["1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3"];
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Validate and normalize an aspect ratio string; `None`/blank falls back to
/// the default, anything outside the supported set is rejected.
pub fn resolve_aspect_ratio(raw: Option<&str>) -> Option<&'static str> {
    let trimmed = raw.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return Some(DEFAULT_ASPECT_RATIO);
    }
    SUPPORTED_ASPECT_RATIOS
        .iter()
        .find(|ratio| **ratio == trimmed)
        .copied()
}

#[derive(Debug, Error)]
pub enum GeminiError {
    /// The API rejected the supplied key. Discriminated so the HTTP layer
    /// can tell the client to re-enter its credential.
    #[error("the generation API rejected the API key")]
    InvalidApiKey,

    #[error("generation request failed: {status} {message}")]
    Api { status: u16, message: String },

    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One response part: either text or inline image data. Serialized back to
/// the client exactly as received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// An attachment already coerced to a supported format, base64-encoded.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn classify_failure(status: reqwest::StatusCode, body: &str) -> GeminiError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    let message = parsed
        .as_ref()
        .and_then(|err| err.message.clone())
        .unwrap_or_else(|| body.trim().to_string());
    let api_status = parsed.and_then(|err| err.status).unwrap_or_default();

    let key_rejected = status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || api_status == "PERMISSION_DENIED"
        || message.to_lowercase().contains("api key");
    if key_rejected {
        return GeminiError::InvalidApiKey;
    }
    GeminiError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Forward one composed request to the image-generation API and return the
/// raw candidate parts. Absent candidates yield an empty list rather than an
/// error, matching the upstream contract.
pub async fn generate_content(
    prompt: &str,
    images: &[ImageAttachment],
    aspect_ratio: &str,
    api_key: &str,
) -> Result<Vec<Part>, GeminiError> {
    let mut parts = vec![json!({ "text": prompt })];
    for image in images {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.data,
            }
        }));
    }
    let body = json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"],
            "imageConfig": { "aspectRatio": aspect_ratio },
        }
    });

    let client = Client::new();
    let response = client
        .post(format!(
            "{GEMINI_API_ROOT}/models/{IMAGE_MODEL}:generateContent"
        ))
        .header("x-goog-api-key", api_key)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        tracing::warn!(%status, "generation API returned an error");
        return Err(classify_failure(status, &text));
    }

    let payload: GenerateContentResponse = response.json().await?;
    let parts = payload
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .unwrap_or_default();
    Ok(parts)
}
