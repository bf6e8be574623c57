//! docqa Context
//!
//! Per-session state and the pipeline that ties ingestion, retrieval and
//! answer synthesis together:
//! - `Session` remembers which document the index currently holds
//! - `Pipeline` reindexes on document change and answers questions

pub mod pipeline;
pub mod session;

pub use pipeline::{Answer, LoadStatus, Pipeline};
pub use session::Session;
