//! Upload text extraction. Only plain-text formats are handled here;
//! Word-binary extraction belongs to an external collaborator behind
//! the same trait.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{Result, StudioError};

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String>;
}

pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" => Ok(tokio::fs::read_to_string(path).await?),
            other => Err(StudioError::Generic(format!(
                "Không đọc được tệp .{}: chỉ hỗ trợ tệp văn bản thuần (.txt, .md).",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_plain_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("giao_an.txt");
        tokio::fs::write(&path, "nội dung giáo án").await.expect("write");
        let text = PlainTextExtractor.extract(&path).await.expect("extract");
        assert_eq!(text, "nội dung giáo án");
    }

    #[tokio::test]
    async fn rejects_unsupported_format() {
        let err = PlainTextExtractor
            .extract(Path::new("bai_giang.docx"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains(".docx"));
    }
}
