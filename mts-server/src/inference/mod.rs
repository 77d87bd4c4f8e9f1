//! Transcription model invocation
//!
//! The neural model is opaque: it receives mono samples at the inference
//! rate and returns timed notes. Backends are selected by configuration
//! and loaded once into a [`ModelRegistry`] shared by every request.

pub mod command;
pub mod http;

pub use command::CommandModel;
pub use http::HttpModel;

use crate::audio::DecodedAudio;
use async_trait::async_trait;
use mts_common::config::{InferenceBackend, ServiceConfig};
use mts_common::{Error, ModelSelector, NoteEvent, NoteSequence, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Audio-to-notes model
#[async_trait]
pub trait TranscriptionModel: Send + Sync {
    /// Backend description for logs
    fn name(&self) -> &str;

    async fn transcribe(&self, audio: &DecodedAudio) -> Result<NoteSequence>;
}

/// Inference output accepted from either backend
///
/// A bare list of notes or an object with a `notes` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NotesPayload {
    Wrapped { notes: Vec<NoteEvent> },
    Bare(Vec<NoteEvent>),
}

pub(crate) fn parse_notes(bytes: &[u8]) -> Result<NoteSequence> {
    let payload: NotesPayload = serde_json::from_slice(bytes)
        .map_err(|e| Error::processing("inference", format!("invalid model output: {}", e)))?;
    let notes = match payload {
        NotesPayload::Wrapped { notes } | NotesPayload::Bare(notes) => notes,
    };
    NoteSequence::from_events(notes)
        .map_err(|e| Error::processing("inference", format!("invalid note in model output: {}", e)))
}

/// One loaded model per selector
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<ModelSelector, Arc<dyn TranscriptionModel>>,
}

impl ModelRegistry {
    /// Build one backend per selector from the resolved configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let mut registry = Self::default();
        for selector in ModelSelector::ALL {
            let checkpoint = config.checkpoint_path(selector.checkpoint_id());
            let model: Arc<dyn TranscriptionModel> = match config.inference.backend {
                InferenceBackend::Command => Arc::new(CommandModel::new(
                    &config.inference.command,
                    selector,
                    checkpoint,
                    config.sample_rate,
                    config.timeouts.inference(),
                )?),
                InferenceBackend::Http => {
                    let url = config.inference.url.clone().ok_or_else(|| {
                        Error::Config("inference.url is required for the http backend".to_string())
                    })?;
                    Arc::new(HttpModel::new(url, selector, config.timeouts.inference())?)
                }
            };
            info!(model = %selector, backend = model.name(), "Registered transcription model");
            registry.models.insert(selector, model);
        }
        Ok(registry)
    }

    pub fn with_model(mut self, selector: ModelSelector, model: Arc<dyn TranscriptionModel>) -> Self {
        self.models.insert(selector, model);
        self
    }

    pub fn get(&self, selector: ModelSelector) -> Result<Arc<dyn TranscriptionModel>> {
        self.models
            .get(&selector)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no model loaded for '{}'", selector)))
    }

    pub fn selectors(&self) -> impl Iterator<Item = ModelSelector> + '_ {
        self.models.keys().copied()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.models.iter().map(|(k, v)| (k, v.name())))
            .finish()
    }
}
