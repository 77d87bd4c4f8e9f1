//! Model listing

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AvailableModels {
    /// Selector → checkpoint id
    pub available_models: BTreeMap<String, String>,
}

/// GET /available-models
pub async fn list_available_models(State(state): State<AppState>) -> Json<AvailableModels> {
    let available_models = state
        .pipeline
        .models()
        .selectors()
        .map(|s| (s.to_string(), s.checkpoint_id().to_string()))
        .collect();

    Json(AvailableModels { available_models })
}

pub fn model_routes() -> Router<AppState> {
    Router::new()
        .route("/available-models", get(list_available_models))
        .route("/available-models/", get(list_available_models))
}
