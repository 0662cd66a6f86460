//! Document parsing collaborator.

use async_trait::async_trait;

use super::SourceDocument;
use crate::error::{Result, ValidationError};

/// Extracts plain text from a [`SourceDocument`].
///
/// Binary formats (PDF, HTML, Office) are handled by external
/// implementations; [`PlainTextParser`] covers `text/*`.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// True if this parser handles `media_type`.
    fn supports(&self, media_type: &str) -> bool;

    /// Extracts the document's text.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the document has no extractable text.
    async fn parse(&self, document: &SourceDocument) -> Result<String>;
}

/// Parser for `text/*` documents.
///
/// Strips a leading byte-order mark and normalizes line endings to `\n`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextParser;

impl PlainTextParser {
    /// Creates a plain text parser.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentParser for PlainTextParser {
    fn supports(&self, media_type: &str) -> bool {
        media_type
            .split(';')
            .next()
            .is_some_and(|essence| essence.trim().starts_with("text/"))
    }

    async fn parse(&self, document: &SourceDocument) -> Result<String> {
        let text = document
            .content
            .trim_start_matches('\u{feff}')
            .replace("\r\n", "\n")
            .replace('\r', "\n");
        if text.trim().is_empty() {
            return Err(ValidationError::invalid_field("content", "no extractable text").into());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_text_types() {
        let parser = PlainTextParser::new();
        assert!(parser.supports("text/plain"));
        assert!(parser.supports("text/markdown; charset=utf-8"));
        assert!(!parser.supports("application/pdf"));
    }

    #[tokio::test]
    async fn test_normalizes_line_endings_and_bom() {
        let doc = SourceDocument::text("d", "\u{feff}one\r\ntwo\rthree");
        let text = PlainTextParser::new().parse(&doc).await.unwrap();
        assert_eq!(text, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn test_whitespace_only_rejected() {
        let doc = SourceDocument::text("d", " \r\n ");
        let err = PlainTextParser::new().parse(&doc).await.unwrap_err();
        assert!(err.is_validation());
    }
}
