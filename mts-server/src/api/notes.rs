//! Note listing for a stored MIDI file
//!
//! Reads an artifact back from the MIDI directory so the dashboard can
//! inspect a transcription after the original response is gone.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use mts_common::{Error, NoteSequence};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::midi::midi_to_sequence;
use crate::storage::{locate_artifact, ArtifactKind};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct NotesParams {
    pub midi_file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotesResponse {
    pub midi_file_name: String,
    pub note_count: usize,
    pub total_time: f64,
    pub pitch_range: Option<(u8, u8)>,
    pub instruments: Vec<u32>,
    pub notes: NoteSequence,
}

/// GET /notes?midi_file_name=<name>
pub async fn list_notes(
    State(state): State<AppState>,
    Query(params): Query<NotesParams>,
) -> ApiResult<Json<NotesResponse>> {
    let midi_file_name = params
        .midi_file_name
        .ok_or_else(|| ApiError::BadRequest("query parameter 'midi_file_name' is required".to_string()))?;

    let path = locate_artifact(&state.pipeline.config().layout, ArtifactKind::Midi, &midi_file_name)?;
    let bytes = tokio::fs::read(&path).await.map_err(Error::from)?;
    let notes = tokio::task::spawn_blocking(move || midi_to_sequence(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("MIDI parse task failed: {}", e)))??;
    debug!(path = %path.display(), notes = notes.len(), "Parsed stored MIDI file");

    Ok(Json(NotesResponse {
        midi_file_name,
        note_count: notes.len(),
        total_time: notes.total_time(),
        pitch_range: notes.pitch_range(),
        instruments: notes.instruments(),
        notes,
    }))
}

pub fn notes_routes() -> Router<AppState> {
    Router::new()
        .route("/notes", get(list_notes))
        .route("/notes/", get(list_notes))
}
