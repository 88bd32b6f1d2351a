
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::indexer::Document;

/// A contiguous window of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub content: String,
    /// Position of this chunk within the document
    pub chunk_index: usize,
    /// Offset of the first character, counted in characters rather than bytes
    pub start_offset: usize,
}

impl Chunk {
    /// Length of the chunk in characters
    #[inline]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Configuration for fixed-size character chunking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by two consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// Distance between the starts of two consecutive chunks
    #[inline]
    pub fn stride(&self) -> Result<usize, ChunkingError> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                size: self.chunk_size,
            });
        }
        Ok(self.chunk_size - self.chunk_overlap)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
}

/// Split text into windows of at most `chunk_size` characters.
///
/// Consecutive windows share exactly `chunk_overlap` characters. The last
/// window ends at the end of the text and may be shorter than the others.
/// Empty text produces no chunks.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>, ChunkingError> {
    let stride = config.stride()?;

    // Byte offset of every char boundary, plus the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_count {
        let end = (start + config.chunk_size).min(char_count);
        chunks.push(Chunk {
            content: text[boundaries[start]..boundaries[end]].to_string(),
            chunk_index: chunks.len(),
            start_offset: start,
        });

        if end == char_count {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Chunk a loaded document using the configured window
#[inline]
pub fn chunk_document(
    document: &Document,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, ChunkingError> {
    let chunks = chunk_text(&document.content, config)?;

    debug!(
        "Chunked '{}' into {} chunks (size {}, overlap {})",
        document.source.display(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}
