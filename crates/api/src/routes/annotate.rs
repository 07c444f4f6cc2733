use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use validator::Validate;

use subtext_annotation::scheduler::AnnotationEvent;
use subtext_annotation::types::{ChapterSpec, Paragraph};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct AnnotateRequest {
    #[validate(length(min = 1, max = 64))]
    pub subject_id: String,
    #[validate(length(min = 1))]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub chapters: Option<Vec<ChapterSpec>>,
}

/// Streams annotation events for one subject as server-sent events:
/// `progress`, then `chunk_result` per completed chunk in completion order,
/// then a terminal `done`.
pub async fn stream(
    State(state): State<AppState>,
    Json(body): Json<AnnotateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let rx = state
        .scheduler
        .annotate_stream(body.subject_id, body.paragraphs, body.chapters);

    let stream = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(encode(event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn encode(event: AnnotationEvent) -> Event {
    let name = match &event {
        AnnotationEvent::Progress { .. } => "progress",
        AnnotationEvent::ChunkResult(_) => "chunk_result",
        AnnotationEvent::Done { .. } => "done",
    };
    match Event::default().event(name).json_data(&event) {
        Ok(encoded) => encoded,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}
