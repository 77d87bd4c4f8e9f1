//! Transcription endpoint

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use mts_common::ModelSelector;
use serde::Deserialize;
use tracing::error;

use crate::delivery::{ResponseFormat, TranscriptionResponse};
use crate::{ApiError, ApiResult, AppState, TranscribeRequest};

#[derive(Debug, Deserialize)]
pub struct TranscribeParams {
    pub filename: Option<String>,
    pub model_type: Option<String>,
    pub response_format: Option<String>,
}

impl TranscribeParams {
    /// Validate query values; the selector is checked before anything else
    fn into_request(self) -> ApiResult<TranscribeRequest> {
        let model = match self.model_type.as_deref() {
            Some(raw) => raw.parse::<ModelSelector>()?,
            None => ModelSelector::default(),
        };
        let format = match self.response_format.as_deref() {
            Some(raw) => raw.parse::<ResponseFormat>()?,
            None => ResponseFormat::default(),
        };
        let filename = self
            .filename
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("query parameter 'filename' is required".to_string()))?;

        Ok(TranscribeRequest {
            filename,
            model,
            format,
        })
    }
}

/// POST /transcribe?filename=<name>&model_type=<piano|multi-instrument>&response_format=<paths|base64>
pub async fn transcribe(
    State(state): State<AppState>,
    Query(params): Query<TranscribeParams>,
) -> ApiResult<Json<TranscriptionResponse>> {
    let request = params.into_request()?;

    match state.pipeline.run(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let err = ApiError::from(e);
            error!(file = %request.filename, model = %request.model, error = %err, "Transcription failed");
            state.record_error(&err).await;
            Err(err)
        }
    }
}

pub fn transcribe_routes() -> Router<AppState> {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/transcribe/", post(transcribe))
}
