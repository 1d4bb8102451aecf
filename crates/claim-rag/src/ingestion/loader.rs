//! Policy document loading (PDF, plain text, Markdown)

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Document, FileType};

/// Source of policy text
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load a document from a filesystem path
    async fn load(&self, path: &Path) -> Result<Document>;

    /// Load a document from uploaded bytes; the name selects the format
    async fn load_bytes(&self, name: &str, data: Bytes) -> Result<Document>;
}

/// Loads PDF and text documents from disk or memory
#[derive(Debug, Clone)]
pub struct FileDocumentLoader {
    /// Upper bound on PDF text extraction
    extract_timeout: Duration,
}

impl Default for FileDocumentLoader {
    fn default() -> Self {
        Self {
            extract_timeout: Duration::from_secs(60),
        }
    }
}

impl FileDocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the PDF extraction time bound
    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout = timeout;
        self
    }

    async fn parse(&self, name: &str, data: Bytes) -> Result<Document> {
        let file_type = FileType::from_name(name);

        let document = match file_type {
            FileType::Pdf => self.parse_pdf(name, data).await?,
            FileType::Txt | FileType::Markdown => {
                Document::new(name, file_type, String::from_utf8_lossy(&data).into_owned())
            }
            FileType::Unknown => {
                return Err(Error::document_load(
                    name,
                    "unsupported file type (expected .pdf, .txt or .md)",
                ))
            }
        };

        if document.text.trim().is_empty() {
            return Err(Error::document_load(name, "no text content could be extracted"));
        }

        tracing::info!(
            "Loaded {} ({:?}, {} chars, {} pages)",
            name,
            document.file_type,
            document.char_len(),
            document
                .page_count
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string())
        );

        Ok(document)
    }

    async fn parse_pdf(&self, name: &str, data: Bytes) -> Result<Document> {
        let owned_name = name.to_string();
        let seconds = self.extract_timeout.as_secs();

        // pdf-extract is synchronous and can stall on unusual fonts
        let task = tokio::task::spawn_blocking(move || {
            let page_count = lopdf::Document::load_mem(&data)
                .ok()
                .map(|doc| doc.get_pages().len() as u32);

            let text = match pdf_extract::extract_text_from_mem(&data) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("pdf-extract failed for {}: {}, trying fallback", owned_name, e);
                    extract_pdf_text_fallback(&owned_name, &data)?
                }
            };
            Ok::<_, Error>((clean_pdf_text(&text), page_count))
        });

        let (text, page_count) = match tokio::time::timeout(self.extract_timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => {
                return Err(Error::document_load(
                    name,
                    format!("PDF extraction crashed: {}", join_err),
                ))
            }
            Err(_) => {
                tracing::error!("PDF extraction for {} exceeded {}s", name, seconds);
                return Err(Error::timeout("pdf extraction", seconds));
            }
        };

        let document = Document::new(name, FileType::Pdf, text);
        Ok(match page_count {
            Some(pages) => document.with_page_count(pages),
            None => document,
        })
    }
}

#[async_trait]
impl DocumentSource for FileDocumentLoader {
    async fn load(&self, path: &Path) -> Result<Document> {
        let display = path.display().to_string();

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::DocumentNotFound(display))
            }
            Err(e) => return Err(Error::document_load(display, e.to_string())),
        };

        self.parse(&display, Bytes::from(data)).await
    }

    async fn load_bytes(&self, name: &str, data: Bytes) -> Result<Document> {
        self.parse(name, data).await
    }
}

/// Normalise extracted PDF text: drop NULs, expand ligatures, remove blank lines
fn clean_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{00A0}', " ")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fallback PDF text extraction straight from content streams
fn extract_pdf_text_fallback(name: &str, data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::document_load(name, format!("failed to load PDF: {}", e)))?;

    let mut all_text = String::new();
    for (page_num, page_id) in doc.get_pages() {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                let text = text_from_content_stream(&content);
                if !text.is_empty() {
                    all_text.push_str(&text);
                    all_text.push('\n');
                }
            }
            Err(e) => tracing::debug!("No content for page {} of {}: {}", page_num, name, e),
        }
    }

    if all_text.trim().is_empty() {
        return Err(Error::document_load(
            name,
            "PDF appears to be image-based or encrypted; no extractable text",
        ));
    }

    Ok(all_text)
}

/// Collect the literal strings shown by `Tj`/`TJ` inside `BT ... ET` blocks
fn text_from_content_stream(content: &[u8]) -> String {
    let content = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content.lines().map(str::trim) {
        match line {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                if !text.ends_with(' ') && !text.is_empty() {
                    text.push(' ');
                }
            }
            _ if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) => {
                if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                    if start < end {
                        text.push_str(
                            &line[start + 1..end]
                                .replace("\\n", "\n")
                                .replace("\\(", "(")
                                .replace("\\)", ")")
                                .replace("\\\\", "\\"),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let loader = FileDocumentLoader::new();
        let err = loader
            .load(Path::new("/definitely/not/here/policy.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_load_text_bytes() {
        let loader = FileDocumentLoader::new();
        let doc = loader
            .load_bytes("terms.txt", Bytes::from_static(b"Section 4.2: knee replacement covered"))
            .await
            .unwrap();
        assert_eq!(doc.file_type, FileType::Txt);
        assert!(doc.text.contains("knee replacement"));
        assert_eq!(doc.page_count, None);
    }

    #[tokio::test]
    async fn test_unsupported_and_empty_documents() {
        let loader = FileDocumentLoader::new();
        let err = loader.load_bytes("scan.docx", Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, Error::DocumentLoad { .. }));

        let err = loader.load_bytes("blank.md", Bytes::from_static(b"  \n\t")).await.unwrap_err();
        assert!(matches!(err, Error::DocumentLoad { .. }));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_load_error() {
        let loader = FileDocumentLoader::new();
        let err = loader
            .load_bytes("broken.pdf", Bytes::from_static(b"not a pdf at all"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentLoad { .. }));
    }

    #[test]
    fn test_content_stream_text() {
        let stream = b"BT\n/F1 12 Tf\n(Waiting period: 24 months) Tj\nET\nBT\n(Clause \\(b\\)) Tj\nET";
        assert_eq!(
            text_from_content_stream(stream),
            "Waiting period: 24 months Clause (b)"
        );
    }

    #[test]
    fn test_clean_pdf_text() {
        assert_eq!(
            clean_pdf_text("  \u{FB01}rst line \n\n\0second\u{00A0}line  "),
            "first line\nsecond line"
        );
    }
}
