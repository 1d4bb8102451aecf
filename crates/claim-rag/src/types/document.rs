//! Document and chunk types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Supported policy document formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a file name or path
    pub fn from_name(name: &str) -> Self {
        std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Whether the loader can turn this type into text
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Text extracted from a policy document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Path or upload name the text came from
    pub source: String,
    /// Detected format
    pub file_type: FileType,
    /// Extracted text
    pub text: String,
    /// Number of pages, when the format has pages
    pub page_count: Option<u32>,
    /// SHA-256 of the text, hex encoded
    pub content_hash: String,
}

impl Document {
    /// Create a document from extracted text
    pub fn new(source: impl Into<String>, file_type: FileType, text: String) -> Self {
        Self {
            source: source.into(),
            file_type,
            content_hash: hash_content(&text),
            text,
            page_count: None,
        }
    }

    /// Attach a page count
    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = Some(pages);
        self
    }

    /// Length of the text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// A contiguous window of document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in document order
    pub index: usize,
    /// First character offset (inclusive)
    pub char_start: usize,
    /// Last character offset (exclusive)
    pub char_end: usize,
    /// Window text
    pub text: String,
}

impl Chunk {
    /// Number of characters in the window
    pub fn len(&self) -> usize {
        self.char_end - self.char_start
    }

    /// Whether the window holds no characters
    pub fn is_empty(&self) -> bool {
        self.char_end == self.char_start
    }
}
