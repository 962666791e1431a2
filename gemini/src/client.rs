use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::GeminiError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One element of the generation stream. The stream is finite and
/// non-restartable: after `Done` or `Error` nothing else arrives.
#[derive(Debug)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Error(GeminiError),
}

/// Streaming text-generation client for the Gemini REST API.
pub struct GeminiClient {
    api_key: String,
    pub model: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_model(api_key, "gemini-3-flash-preview".to_string())
    }

    pub fn new_with_model(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            http: reqwest::Client::new(),
        }
    }

    /// Issue one streaming generation call. Chunks arrive in order on
    /// the returned channel; the transport preserves ordering.
    pub async fn stream_generate(
        &self,
        system_instruction: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<mpsc::Receiver<StreamEvent>, GeminiError> {
        if self.api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let url = format!(
            "{}/{}:streamGenerateContent?alt=sse",
            API_BASE, self.model
        );
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": user_prompt}]}],
            "systemInstruction": {"parts": [{"text": system_instruction}]},
            "generationConfig": {"temperature": temperature},
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
            warn!(status = status.as_u16(), "generation request rejected");
            return Err(GeminiError::from_response(status.as_u16(), text));
        }

        let stream = resp.bytes_stream();
        let (tx, rx) = mpsc::channel::<StreamEvent>(64);
        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut buf = Vec::new();
            let mut stream = Box::pin(stream);
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buf.extend_from_slice(&bytes);
                        // SSE frames are separated by a blank line.
                        while let Some(pos) = memchr::memmem::find(&buf, b"\n\n") {
                            let frame = buf.drain(..pos + 2).collect::<Vec<u8>>();
                            let Ok(text) = String::from_utf8(frame) else {
                                continue;
                            };
                            for line in text.lines() {
                                let line = line.trim_start();
                                let Some(data) = line.strip_prefix("data: ") else {
                                    continue;
                                };
                                match serde_json::from_str::<serde_json::Value>(data) {
                                    Ok(v) => {
                                        if let Some(delta) = v["candidates"][0]["content"]
                                            ["parts"][0]["text"]
                                            .as_str()
                                        {
                                            debug!(len = delta.len(), "delta");
                                            if tx
                                                .send(StreamEvent::Delta(delta.to_string()))
                                                .await
                                                .is_err()
                                            {
                                                return;
                                            }
                                        } else if let Some(err) = v.get("error") {
                                            let code = err["code"].as_u64().unwrap_or(0) as u16;
                                            let _ = tx
                                                .send(StreamEvent::Error(
                                                    GeminiError::from_response(
                                                        code,
                                                        err.to_string(),
                                                    ),
                                                ))
                                                .await;
                                            return;
                                        }
                                    }
                                    Err(e) => {
                                        warn!("sse json parse error: {}", e);
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(GeminiError::Stream(e.to_string())))
                            .await;
                        return;
                    }
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
        });
        Ok(rx)
    }
}
