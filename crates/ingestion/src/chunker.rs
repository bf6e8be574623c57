//! Text chunking module
//!
//! Splits page text into fixed-length chunks for embedding. Chunks partition
//! each page left to right with no overlap and no sentence awareness, so a
//! chunk may end mid-word. Lengths are counted in characters, not bytes.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_length: 1000 }
    }
}

/// A text chunk awaiting its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position of this chunk in the document
    pub id: usize,
    /// Chunk content, newlines removed
    pub text: String,
}

/// Split one page into substrings of at most `chunk_length` characters.
///
/// The page is windowed first and newlines are removed from each window
/// afterwards, so a window containing newlines yields a shorter chunk.
pub fn chunk_text(text: &str, chunk_length: usize) -> Vec<String> {
    let chunk_length = chunk_length.max(1);
    let chars: Vec<char> = text.chars().collect();

    chars
        .chunks(chunk_length)
        .map(|window| window.iter().filter(|c| **c != '\n').collect())
        .collect()
}

/// Chunk every page of a document, numbering chunks in document order
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<TextChunk> {
    let chunks: Vec<TextChunk> = document
        .pages
        .iter()
        .flat_map(|page| chunk_text(page, config.chunk_length))
        .enumerate()
        .map(|(id, text)| TextChunk { id, text })
        .collect();

    debug!(
        document = %document.identity,
        page_count = document.pages.len(),
        chunk_count = chunks.len(),
        chunk_length = config.chunk_length,
        "Document chunked"
    );

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 1000).is_empty());
        let doc = Document::from_pages("empty", vec![String::new(), String::new()]);
        assert!(chunk_document(&doc, &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_partition_properties() {
        let text = "Course overview\nWeek 1: introduction\nWeek 2: ownership and borrowing\n".repeat(7);
        let total = text.chars().count();

        for length in [1, 7, 10, 64, 1000] {
            let chunks = chunk_text(&text, length);

            assert_eq!(chunks.len(), total.div_ceil(length));
            for chunk in &chunks {
                assert!(chunk.chars().count() <= length);
                assert!(!chunk.contains('\n'));
            }
            assert_eq!(chunks.concat(), text.replace('\n', ""));
        }
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "강의계획서".repeat(3); // 15 characters, 45 bytes
        let chunks = chunk_text(&text, 4);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "강의계획");
        assert_eq!(chunks[3], "계획서");
    }

    #[test]
    fn test_fifteen_hundred_characters() {
        let doc = Document::from_pages("a.pdf", vec!["A".repeat(1500), String::new()]);
        let chunks = chunk_document(&doc, &ChunkingConfig::default());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.len(), 1000);
        assert_eq!(chunks[1].text.len(), 500);
        assert_eq!(chunks[0].id, 0);
        assert_eq!(chunks[1].id, 1);
    }

    #[test]
    fn test_ids_continue_across_pages() {
        let doc = Document::from_pages(
            "two-pages",
            vec!["abcdef".to_string(), "ghij".to_string()],
        );
        let chunks = chunk_document(&doc, &ChunkingConfig { chunk_length: 4 });

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "ef", "ghij"]);
        assert_eq!(chunks.iter().map(|c| c.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_length_is_clamped() {
        assert_eq!(chunk_text("abc", 0), vec!["a", "b", "c"]);
    }
}
