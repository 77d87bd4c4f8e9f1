//! mts-server library interface
//!
//! Audio-to-MIDI transcription service: storage, decoding, model
//! invocation, MIDI serialization and derived artifact rendering, exposed
//! over HTTP and through the `mts-transcribe` command line front-end.

pub mod api;
pub mod audio;
pub mod delivery;
pub mod error;
pub mod inference;
pub mod midi;
pub mod pipeline;
pub mod process;
pub mod render;
pub mod storage;

pub use crate::error::{ApiError, ApiResult};
pub use crate::pipeline::{Pipeline, TranscribeRequest};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last pipeline error, reported by `/health`
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_error(&self, err: &ApiError) {
        *self.last_error.write().await = Some(err.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.pipeline.config().max_upload_bytes;

    Router::new()
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .merge(api::model_routes())
        .merge(api::upload_routes())
        .merge(api::transcribe_routes())
        .merge(api::download_routes())
        .merge(api::notes_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
