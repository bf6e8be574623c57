//! docqa Ingestion
//!
//! Turns a PDF into the chunk sequence that gets embedded:
//! 1. Reads the file and derives its identity
//! 2. Extracts text page by page
//! 3. Splits each page into fixed-length chunks

pub mod chunker;
pub mod document;
pub mod errors;
pub mod pdf;

pub use chunker::{chunk_document, chunk_text, ChunkingConfig, TextChunk};
pub use document::{Document, DocumentIdentity};
pub use errors::IngestionError;
pub use pdf::{LopdfExtractor, PageExtractor};
