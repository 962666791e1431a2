use thiserror::Error;

/// Errors from the generative API, classified so callers can tell a
/// rate-limit condition from a bad credential or anything else. The
/// display strings for the first three are the user-facing messages.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Không tìm thấy API Key hệ thống. Vui lòng kiểm tra lại cấu hình.")]
    MissingApiKey,

    #[error("Lỗi 429: Hết hạn ngạch API. Hệ thống miễn phí có thể đang quá tải, vui lòng thử lại sau ít phút.")]
    QuotaExceeded,

    #[error("API Key hệ thống không hợp lệ. Vui lòng liên hệ quản trị viên.")]
    InvalidApiKey,

    #[error("gemini http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("stream transport error: {0}")]
    Stream(String),

    #[error("unexpected response shape: {0}")]
    Malformed(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl GeminiError {
    /// Classify a non-success HTTP response.
    pub fn from_response(status: u16, body: String) -> Self {
        if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            return GeminiError::QuotaExceeded;
        }
        let lowered = body.to_lowercase();
        if lowered.contains("api key not valid") || body.contains("API_KEY_INVALID") {
            return GeminiError::InvalidApiKey;
        }
        GeminiError::Http { status, body }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, GeminiError::QuotaExceeded)
    }
}
