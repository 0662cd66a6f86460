//! Documents moving through ingestion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::filter::FilterValue;

/// Maximum raw document size in bytes (1 MB).
pub const MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// Maximum metadata entries per document.
pub const MAX_METADATA_ENTRIES: usize = 64;

/// Maximum length of a document ID.
pub const MAX_DOC_ID_LENGTH: usize = 256;

/// A document submitted for ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable document identity.
    pub doc_id: String,

    /// Where the document came from.
    pub source_uri: Option<String>,

    /// Document version; re-ingesting a new version supersedes the old chunks.
    pub version_id: Option<String>,

    /// MIME type used to pick a parser.
    pub media_type: String,

    /// Raw content.
    pub content: String,

    /// Metadata copied onto every chunk.
    #[serde(default)]
    pub metadata: BTreeMap<String, FilterValue>,
}

impl SourceDocument {
    /// Creates a `text/plain` document.
    pub fn text(doc_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            source_uri: None,
            version_id: None,
            media_type: "text/plain".to_string(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Sets the source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// Sets the version.
    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Validates a [`SourceDocument`] before ingestion starts.
///
/// # Rules
///
/// | Field | Constraint |
/// |-------|------------|
/// | `doc_id` | Non-blank, max 256 chars |
/// | `content` | Non-empty, max 1 MB |
/// | `metadata` | Max 64 entries |
pub(crate) fn validate_document(doc: &SourceDocument) -> Result<(), ValidationError> {
    if doc.doc_id.trim().is_empty() {
        return Err(ValidationError::required_field("doc_id"));
    }

    if doc.doc_id.len() > MAX_DOC_ID_LENGTH {
        return Err(ValidationError::invalid_field(
            "doc_id",
            format!(
                "length {} exceeds maximum {}",
                doc.doc_id.len(),
                MAX_DOC_ID_LENGTH
            ),
        ));
    }

    if doc.content.is_empty() {
        return Err(ValidationError::required_field("content"));
    }

    if doc.content.len() > MAX_DOCUMENT_SIZE {
        return Err(ValidationError::content_too_large(
            doc.content.len(),
            MAX_DOCUMENT_SIZE,
        ));
    }

    if doc.metadata.len() > MAX_METADATA_ENTRIES {
        return Err(ValidationError::too_many_items(
            "metadata",
            doc.metadata.len(),
            MAX_METADATA_ENTRIES,
        ));
    }

    Ok(())
}

/// Plain text extracted from a [`SourceDocument`].
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedDocument {
    /// The source document, content included.
    pub source: SourceDocument,
    /// Extracted text.
    pub text: String,
}

/// One chunk of a parsed document, not yet embedded.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentChunk {
    /// Owning document.
    pub doc_id: String,
    /// Position within the document, from 0.
    pub index: usize,
    /// Chunk text.
    pub text: String,
    /// Source URI of the document.
    pub source_uri: Option<String>,
    /// Document version.
    pub version_id: Option<String>,
    /// Document metadata.
    pub metadata: BTreeMap<String, FilterValue>,
}

impl DocumentChunk {
    /// Record ID: `<doc_id>#<index>`.
    pub fn record_id(&self) -> String {
        format!("{}#{}", self.doc_id, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_document() {
        assert!(validate_document(&SourceDocument::text("d1", "hello")).is_ok());
    }

    #[test]
    fn test_blank_doc_id_rejected() {
        let err = validate_document(&SourceDocument::text(" ", "hello")).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredField { .. }));
    }

    #[test]
    fn test_empty_content_rejected() {
        assert!(validate_document(&SourceDocument::text("d1", "")).is_err());
    }

    #[test]
    fn test_oversized_content_rejected() {
        let doc = SourceDocument::text("d1", "x".repeat(MAX_DOCUMENT_SIZE + 1));
        let err = validate_document(&doc).unwrap_err();
        assert!(matches!(err, ValidationError::ContentTooLarge { .. }));
    }

    #[test]
    fn test_too_much_metadata_rejected() {
        let mut doc = SourceDocument::text("d1", "x");
        for i in 0..=MAX_METADATA_ENTRIES {
            doc = doc.with_metadata(format!("k{i}"), i as i64);
        }
        let err = validate_document(&doc).unwrap_err();
        assert!(matches!(err, ValidationError::TooManyItems { .. }));
    }

    #[test]
    fn test_record_id() {
        let chunk = DocumentChunk {
            doc_id: "guide".into(),
            index: 3,
            text: String::new(),
            source_uri: None,
            version_id: None,
            metadata: BTreeMap::new(),
        };
        assert_eq!(chunk.record_id(), "guide#3");
    }
}
