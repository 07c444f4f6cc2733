use axum::{Json, extract::State};
use serde::Deserialize;

use subtext_annotation::chapters::{ChapterOutline, assign_segment_ranges};
use subtext_annotation::segmenter::merge_fragments;
use subtext_annotation::types::{Fragment, Paragraph};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ParagraphsRequest {
    pub fragments: Vec<Fragment>,
}

/// Merges raw caption fragments into readable, timed paragraphs.
pub async fn paragraphs(
    State(state): State<AppState>,
    Json(body): Json<ParagraphsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.fragments.is_empty() {
        return Err(ApiError::BadRequest("No fragments provided".to_string()));
    }

    let pipeline = &state.config.pipeline;
    let paragraphs = merge_fragments(
        &body.fragments,
        pipeline.soft_paragraph_chars,
        pipeline.hard_paragraph_chars,
    );

    Ok(Json(serde_json::json!({
        "paragraphs": paragraphs,
        "total": paragraphs.len(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct AlignChaptersRequest {
    pub chapters: Vec<ChapterOutline>,
    pub paragraphs: Vec<Paragraph>,
}

/// Assigns each chapter its paragraph index range from chapter start times.
pub async fn align_chapters(
    Json(body): Json<AlignChaptersRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.chapters.is_empty() {
        return Err(ApiError::BadRequest("No chapters provided".to_string()));
    }
    if body.paragraphs.is_empty() {
        return Err(ApiError::BadRequest("No paragraphs provided".to_string()));
    }

    let chapters = assign_segment_ranges(&body.chapters, &body.paragraphs);
    Ok(Json(serde_json::json!({ "chapters": chapters })))
}
