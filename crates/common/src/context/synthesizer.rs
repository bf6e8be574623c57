//! Answer Synthesizer - composes the final answer from retrieved facts
//!
//! The answer is written in the language of the question, using the facts
//! that retrieval returned for the question's intent.

use crate::completion::CompletionModel;
use crate::errors::{Outcome, Result, Stage};
use std::sync::Arc;
use tracing::debug;

/// Synthesizer for generating answers
#[derive(Clone)]
pub struct Synthesizer {
    model: Arc<dyn CompletionModel>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Synthesize an answer, degrading to an empty string if the model fails
    pub async fn synthesize(&self, facts: &[String], question: &str) -> Outcome<String> {
        Outcome::from_result(Stage::Synthesize, self.try_synthesize(facts, question).await)
    }

    /// Synthesize an answer, propagating completion failures
    pub async fn try_synthesize(&self, facts: &[String], question: &str) -> Result<String> {
        let prompt = build_prompt(facts, question);
        let answer = self.model.complete(&prompt).await?.trim().to_string();

        debug!(
            fact_count = facts.len(),
            answer_len = answer.chars().count(),
            "Synthesized answer"
        );
        Ok(answer)
    }
}

/// Build the synthesis prompt
fn build_prompt(facts: &[String], question: &str) -> String {
    let mut prompt = String::from(
        "Please answer the following question in the same language as the question itself. \
        If the question is in Korean, answer in Korean. \
        If the question is in English, answer in English.",
    );

    prompt.push_str(&format!(" QUESTION: {}.", question));
    prompt.push_str(" FACTS:");

    if facts.is_empty() {
        prompt.push_str(" (none)");
    }
    for (i, fact) in facts.iter().enumerate() {
        prompt.push_str(&format!("\n[{}] {}", i + 1, fact));
    }

    prompt
}
