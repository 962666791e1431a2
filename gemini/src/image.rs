use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::GeminiError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Inline image returned by the image model, kept base64-encoded all
/// the way to the export descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data_base64: String,
}

/// Client for the image-generation endpoint. Each call is independent
/// and not restartable.
pub struct ImageClient {
    api_key: String,
    pub model: String,
    http: reqwest::Client,
}

impl ImageClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_model(api_key, "imagen-3.0-generate-002".to_string())
    }

    pub fn new_with_model(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            http: reqwest::Client::new(),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<ImagePayload, GeminiError> {
        if self.api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let url = format!("{}/{}:predict", API_BASE, self.model);
        let body = json!({
            "instances": [{"prompt": prompt}],
            "parameters": {"sampleCount": 1, "aspectRatio": aspect_ratio},
        });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GeminiError::from_response(status.as_u16(), text));
        }

        let v: serde_json::Value = resp.json().await?;
        let prediction = &v["predictions"][0];
        let data = prediction["bytesBase64Encoded"]
            .as_str()
            .ok_or_else(|| GeminiError::Malformed("missing bytesBase64Encoded".to_string()))?;
        let mime_type = prediction["mimeType"].as_str().unwrap_or("image/png");

        // Reject payloads the provider mangled before they reach the
        // slide cache.
        let decoded = BASE64
            .decode(data)
            .map_err(|e| GeminiError::Malformed(format!("invalid base64 payload: {}", e)))?;
        debug!(bytes = decoded.len(), mime = mime_type, "image generated");

        Ok(ImagePayload {
            mime_type: mime_type.to_string(),
            data_base64: data.to_string(),
        })
    }
}
