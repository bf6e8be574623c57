//! PDF text extraction module
//!
//! Extracts per-page text content from PDF files using lopdf.

use crate::document::{Document, DocumentIdentity};
use crate::errors::IngestionError;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

/// Capability: turn a file into a sequence of page texts
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<Document, IngestionError>;
}

/// lopdf-backed extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

#[async_trait]
impl PageExtractor for LopdfExtractor {
    async fn extract(&self, path: &Path) -> Result<Document, IngestionError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IngestionError::FileNotFound(path.display().to_string()),
            _ => IngestionError::IoError(e),
        })?;

        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let identity = DocumentIdentity::from_bytes(name, &bytes);
        let display_path = path.display().to_string();

        // lopdf parsing is CPU-bound
        let pages = tokio::task::spawn_blocking(move || extract_pages_from_bytes(&bytes, &display_path))
            .await
            .map_err(|e| IngestionError::TaskFailed(e.to_string()))??;

        Ok(Document::new(identity, pages))
    }
}

/// Extract text per page from in-memory PDF bytes
pub fn extract_pages_from_bytes(bytes: &[u8], path: &str) -> Result<Vec<String>, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::PdfParseError {
        path: path.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut texts = Vec::with_capacity(pages.len());
    for page_num in pages.keys() {
        match extract_page_text(&doc, *page_num) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, using empty page");
                texts.push(String::new());
            }
        }
    }

    let total_chars: usize = texts.iter().map(|t| t.chars().count()).sum();
    if total_chars == 0 {
        warn!(path, "No text content extracted from PDF");
    }
    debug!(page_count = texts.len(), total_chars, "Text extraction complete");

    Ok(texts)
}

/// Extract text from a single page
fn extract_page_text(doc: &lopdf::Document, page_num: u32) -> Result<String, IngestionError> {
    doc.extract_text(&[page_num])
        .map(|text| normalize_page(&text))
        .map_err(|e| IngestionError::PageExtraction {
            page: page_num,
            message: e.to_string(),
        })
}

/// Normalize line endings and drop byte-order marks
fn normalize_page(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{FEFF}', "")
}
