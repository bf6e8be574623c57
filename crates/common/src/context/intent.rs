//! Intent Extractor - reduces a user question to retrieval keywords
//!
//! The completion model is asked for the salient keywords only, translated
//! into the target language when the question is written in another one,
//! with honorifics and politeness suffixes removed.

use crate::completion::CompletionModel;
use crate::errors::{Outcome, Result, Stage};
use regex_lite::Regex;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Leading labels some models prepend, e.g. `Keywords: ...` or `키워드: ...`
fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i:keywords?|키워드)\s*[:：]\s*").expect("static keyword label pattern")
    })
}

/// Extracts a keyword/intent string from a question
#[derive(Clone)]
pub struct IntentExtractor {
    model: Arc<dyn CompletionModel>,
    target_language: String,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn CompletionModel>, target_language: impl Into<String>) -> Self {
        Self {
            model,
            target_language: target_language.into(),
        }
    }

    /// Extract intent, degrading to an empty string if the model fails
    pub async fn extract(&self, question: &str) -> Outcome<String> {
        Outcome::from_result(Stage::Intent, self.try_extract(question).await)
    }

    /// Extract intent, propagating completion failures
    pub async fn try_extract(&self, question: &str) -> Result<String> {
        let prompt = self.build_prompt(question);
        let raw = self.model.complete(&prompt).await?;
        let intent = normalize(&raw);

        debug!(question = %question, intent = %intent, "Extracted question intent");
        Ok(intent)
    }

    fn build_prompt(&self, question: &str) -> String {
        let lang = &self.target_language;
        format!(
            "Extract the main keywords from the following question: \"{question}\". \
            If the question is in {lang}, extract keywords in {lang}. \
            If the question is in any other language, translate the question to {lang} \
            and extract keywords in {lang}. \
            Do not answer anything else, only the keywords. \
            Remove honorifics and politeness suffixes such as \"님\"."
        )
    }
}

/// Trim the completion down to the bare keyword string
fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let unlabeled = label_pattern().replace(trimmed, "");
    unlabeled
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
        .trim()
        .to_string()
}
