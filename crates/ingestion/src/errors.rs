//! Ingestion error types

use docqa_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    /// A single page could not be decoded; recovered as an empty page
    #[error("Page {page} could not be extracted: {message}")]
    PageExtraction { page: u32, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::FileNotFound(path) => AppError::DocumentNotFound { path },
            IngestionError::PdfParseError { path, message } => {
                AppError::Extraction { path, message }
            }
            IngestionError::PageExtraction { page, message } => AppError::Extraction {
                path: format!("page {}", page),
                message,
            },
            IngestionError::TaskFailed(message) => AppError::Internal { message },
            IngestionError::IoError(e) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}
