//! Session context
//!
//! Carries the identity of the document the index was last built from.
//! The pipeline reads and updates it instead of keeping process-wide state,
//! so separate sessions can later own separate indexes.

use chrono::{DateTime, Utc};
use docqa_ingestion::DocumentIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    current_document: Option<DocumentIdentity>,
    loaded_at: Option<DateTime<Utc>>,
    chunk_count: usize,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            current_document: None,
            loaded_at: None,
            chunk_count: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Document the index currently holds, if any
    pub fn current_document(&self) -> Option<&DocumentIdentity> {
        self.current_document.as_ref()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Whether `identity` differs from the loaded document
    pub fn needs_reload(&self, identity: &DocumentIdentity) -> bool {
        self.current_document.as_ref() != Some(identity)
    }

    /// Record a completed rebuild
    pub fn record_load(&mut self, identity: DocumentIdentity, chunk_count: usize) {
        self.current_document = Some(identity);
        self.loaded_at = Some(Utc::now());
        self.chunk_count = chunk_count;
    }

    /// Forget the loaded document, forcing the next load to rebuild
    pub fn invalidate(&mut self) {
        self.current_document = None;
        self.loaded_at = None;
        self.chunk_count = 0;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
