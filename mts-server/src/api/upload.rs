//! Audio upload

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::warn;

use crate::storage::{self, StoredAudio};
use crate::{ApiError, ApiResult, AppState};

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// POST /upload-audio
///
/// Multipart form with a `file` field. Returns `{filename, filepath}`.
pub async fn upload_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<StoredAudio>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("file field has no file name".to_string()))?;

        // Reject before reading the body
        storage::validate_filename(&filename)?;
        storage::AudioFormat::from_filename(&filename)?;

        let bytes = field.bytes().await.map_err(multipart_error)?;
        let stored = storage::ingest(&state.pipeline.config().layout, &filename, &bytes).await?;
        return Ok(Json(stored));
    }

    warn!("Upload without a file field");
    Err(ApiError::BadRequest("multipart field 'file' is required".to_string()))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/upload-audio", post(upload_audio))
        .route("/upload-audio/", post(upload_audio))
}
