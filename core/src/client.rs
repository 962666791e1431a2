//! Seam over the text-generation collaborator so the session can run
//! against the real Gemini client or a canned stub (no API key, demos,
//! tests).

use async_trait::async_trait;
use edugen_gemini::{GeminiClient, GeminiError, StreamEvent};
use tokio::sync::mpsc;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn stream(
        &self,
        system_instruction: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<mpsc::Receiver<StreamEvent>, GeminiError>;
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn stream(
        &self,
        system_instruction: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<mpsc::Receiver<StreamEvent>, GeminiError> {
        self.stream_generate(system_instruction, user_prompt, temperature)
            .await
    }
}

/// Offline stand-in used when no API key is configured.
pub struct StubGenerator;

const STUB_DECK: &str = r#"[THEME: Xanh Dương]
### Slide 1: Giới thiệu bài học
Đây là nội dung minh họa khi chưa cấu hình API key.
**Từ khóa** được in đậm như nội dung thật.
---
### Slide 2: Kết thúc
Cấu hình GEMINI_API_KEY để tạo nội dung thật.
"#;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn stream(
        &self,
        _system_instruction: &str,
        _user_prompt: &str,
        _temperature: f32,
    ) -> Result<mpsc::Receiver<StreamEvent>, GeminiError> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for line in STUB_DECK.split_inclusive('\n') {
                if tx.send(StreamEvent::Delta(line.to_string())).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
        });
        Ok(rx)
    }
}
