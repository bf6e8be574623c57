//! Question answering handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;
use validator::Validate;

use crate::AppState;
use docqa_common::errors::{AppError, Result, StageFailure};

/// Ask request
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    /// PDF to answer from; reindexed only when its content changed
    #[validate(length(min = 1))]
    pub document_path: String,

    #[validate(length(min = 1, max = 2000))]
    pub question: String,
}

/// Ask response
#[derive(Debug, Serialize)]
pub struct AskResponse {
    /// Answer text, possibly empty when upstream services failed
    pub answer: String,
    pub document: String,
    pub reindexed: bool,
    pub degraded: Vec<StageFailure>,
    pub processing_time_ms: u64,
}

/// Answer a question about a document
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;
    if request.question.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Question must not be blank".to_string(),
            field: Some("question".to_string()),
        });
    }

    // One load+query at a time against the shared index
    let mut session = state.session.lock().await;
    let answer = state
        .pipeline
        .answer_file(&mut session, Path::new(&request.document_path), &request.question)
        .await?;
    drop(session);

    let processing_time_ms = start.elapsed().as_millis() as u64;
    info!(
        document = %answer.document,
        reindexed = answer.reindexed,
        degraded = answer.degraded.len(),
        processing_time_ms,
        "Ask completed"
    );

    Ok(Json(AskResponse {
        answer: answer.text,
        document: answer.document.name().to_string(),
        reindexed: answer.reindexed,
        degraded: answer.degraded,
        processing_time_ms,
    }))
}
