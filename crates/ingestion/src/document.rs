//! Loaded documents and their identity

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of a loaded document.
///
/// Two documents are the same when their bytes are the same; the name is
/// kept for logs and responses only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIdentity {
    digest: String,
    name: String,
}

impl DocumentIdentity {
    /// Identity of a document with the given raw bytes
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            digest: hex::encode(Sha256::digest(bytes)),
            name: name.into(),
        }
    }

    /// Hex SHA-256 of the document bytes
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for DocumentIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for DocumentIdentity {}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, &self.digest[..12.min(self.digest.len())])
    }
}

/// A document reduced to per-page text
#[derive(Debug, Clone)]
pub struct Document {
    pub identity: DocumentIdentity,
    /// Extracted text per page, possibly empty
    pub pages: Vec<String>,
}

impl Document {
    pub fn new(identity: DocumentIdentity, pages: Vec<String>) -> Self {
        Self { identity, pages }
    }

    /// Build a document from in-memory pages; identity is derived from the text
    pub fn from_pages(name: impl Into<String>, pages: Vec<String>) -> Self {
        let joined = pages.join("\u{c}");
        Self {
            identity: DocumentIdentity::from_bytes(name, joined.as_bytes()),
            pages,
        }
    }
}
