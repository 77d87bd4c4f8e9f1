//! Artifact download
//!
//! Files are streamed from their output directory; names are checked so a
//! request can never leave it.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::storage::{locate_artifact, ArtifactKind};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct DownloadMidiParams {
    pub midi_file_name: Option<String>,
}

/// `Content-Disposition` value safe for any stored name
///
/// The quoted `filename` is an ASCII fallback with quotes and backslashes
/// escaped; `filename*` carries the exact name percent-encoded as UTF-8.
fn content_disposition(filename: &str) -> String {
    let mut fallback = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => fallback.push(c),
            _ => fallback.push('_'),
        }
    }

    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^'
            | b'_' | b'`' | b'|' | b'~' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }

    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

async fn stream_artifact(state: &AppState, kind: ArtifactKind, filename: &str) -> ApiResult<Response> {
    let path = locate_artifact(&state.pipeline.config().layout, kind, filename)?;
    let file = tokio::fs::File::open(&path).await.map_err(mts_common::Error::from)?;
    debug!(path = %path.display(), ?kind, "Streaming artifact");

    let headers = [
        (header::CONTENT_TYPE, kind.content_type().to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(filename)),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// GET /download-midi?midi_file_name=<name>
pub async fn download_midi(
    State(state): State<AppState>,
    Query(params): Query<DownloadMidiParams>,
) -> ApiResult<Response> {
    let filename = params
        .midi_file_name
        .ok_or_else(|| ApiError::BadRequest("query parameter 'midi_file_name' is required".to_string()))?;
    stream_artifact(&state, ArtifactKind::Midi, &filename).await
}

/// GET /download/:kind/:filename
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((kind, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    let kind: ArtifactKind = kind.parse()?;
    stream_artifact(&state, kind, &filename).await
}

pub fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/download-midi", get(download_midi))
        .route("/download-midi/", get(download_midi))
        .route("/download/:kind/:filename", get(download_artifact))
}
