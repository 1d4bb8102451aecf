//! Fixed-size overlapping text windows

use crate::error::{Error, Result};
use crate::types::Chunk;

/// Text chunker with configurable size and overlap.
///
/// Sizes count characters (Unicode scalar values), so multi-byte text is
/// never split inside a character.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Window size in characters
    chunk_size: usize,
    /// Characters shared by consecutive windows
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid("chunk_size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(Error::invalid(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &crate::config::ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive windows
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split text into windows in document order
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every char boundary, plus the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = boundaries.len() - 1;

        let mut chunks = Vec::with_capacity(len / self.stride() + 1);
        let mut start = 0;

        while start < len {
            let end = (start + self.chunk_size).min(len);
            chunks.push(Chunk {
                index: chunks.len(),
                char_start: start,
                char_end: end,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            });

            // A further window would sit entirely inside this one
            if end == len {
                break;
            }
            start += self.stride();
        }

        tracing::debug!(
            "Chunked {} chars into {} windows (size {}, overlap {})",
            len,
            chunks.len(),
            self.chunk_size,
            self.overlap
        );

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}
