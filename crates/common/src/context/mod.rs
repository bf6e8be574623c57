//! Question-side components built on the completion capability
//!
//! - Intent extraction: question -> compact keyword string
//! - Answer synthesis: retrieved facts + question -> answer

mod intent;
mod synthesizer;

pub use intent::IntentExtractor;
pub use synthesizer::Synthesizer;
