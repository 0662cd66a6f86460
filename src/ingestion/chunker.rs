//! Fixed-size text chunking with overlap.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Chunk size and overlap, in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters repeated at the start of the next chunk.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// Validates that chunks make progress.
    ///
    /// # Errors
    /// Returns `ValidationError` if `chunk_size` is 0 or `overlap >= chunk_size`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chunk_size == 0 {
            return Err(ValidationError::invalid_field(
                "chunk_size",
                "must be greater than 0",
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(ValidationError::invalid_field(
                "overlap",
                format!(
                    "must be less than chunk_size ({} >= {})",
                    self.overlap, self.chunk_size
                ),
            ));
        }
        Ok(())
    }
}

/// Splits text into overlapping windows of at most `chunk_size` characters.
///
/// Windows end at the last whitespace inside the window when there is one in
/// its second half, so words are rarely split. Boundaries are always on
/// `char` boundaries. Whitespace-only chunks are skipped.
///
/// # Example
///
/// ```rust
/// use pulserag::ingestion::{ChunkingConfig, TextChunker};
///
/// let chunker = TextChunker::new(ChunkingConfig { chunk_size: 10, overlap: 0 }).unwrap();
/// assert_eq!(chunker.chunk("alpha beta gamma"), vec!["alpha beta", "gamma"]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    /// Creates a chunker.
    ///
    /// # Errors
    ///
    /// Returns the config's validation error.
    pub fn new(config: ChunkingConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The chunking configuration.
    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Splits `text` into chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let ChunkingConfig {
            chunk_size,
            overlap,
        } = self.config;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let hard_end = (start + chunk_size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                soft_break(&chars, start, hard_end)
            };

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }

            if end == chars.len() {
                break;
            }
            // Always advance, even with a large overlap and an early break.
            start = end.saturating_sub(overlap).max(start + 1);
        }
        chunks
    }
}

/// `hard_end` if the window is followed by whitespace, else the position
/// after the last whitespace in the window's second half, else `hard_end`.
fn soft_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    if chars[hard_end].is_whitespace() {
        return hard_end;
    }
    let half = start + (hard_end - start) / 2;
    (half..hard_end)
        .rev()
        .find(|&i| chars[i].is_whitespace())
        .map_or(hard_end, |i| i + 1)
}
