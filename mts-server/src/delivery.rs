//! Artifact delivery
//!
//! Turns a finished transcription into the response body: either the
//! artifact paths on the server, or the file contents base64-encoded.

use crate::pipeline::TranscriptionOutcome;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mts_common::{Error, ModelSelector, NoteSequence, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Paths,
    Base64,
}

impl std::str::FromStr for ResponseFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paths" => Ok(ResponseFormat::Paths),
            "base64" => Ok(ResponseFormat::Base64),
            other => Err(Error::InvalidInput(format!(
                "Invalid response format '{}'. Choose from 'paths' or 'base64'.",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ArtifactPayload {
    Paths {
        midi_file_path: String,
        midi_audio_path: Option<String>,
        midi_score_path: Option<String>,
        midi_plot_path: Option<String>,
    },
    Base64 {
        midi_file_base64: String,
        midi_audio_base64: Option<String>,
        midi_score_base64: Option<String>,
        midi_plot_base64: Option<String>,
    },
}

/// Body of a successful `/transcribe` call
#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub midi_file_name: String,
    pub model_type: ModelSelector,
    pub response_format: ResponseFormat,
    pub note_count: usize,
    pub total_time: f64,
    #[serde(flatten)]
    pub artifacts: ArtifactPayload,
    /// Notes for client-side plotting
    pub notes: NoteSequence,
}

fn ensure_present(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::NotFound(format!("Artifact missing: {}", path.display())))
    }
}

fn path_string(path: &Path) -> Result<String> {
    ensure_present(path)?;
    Ok(path.display().to_string())
}

async fn encode_file(path: &Path) -> Result<String> {
    ensure_present(path)?;
    let bytes = tokio::fs::read(path).await?;
    Ok(STANDARD.encode(bytes))
}

async fn encode_optional(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => Ok(Some(encode_file(path).await?)),
        None => Ok(None),
    }
}

/// Build the response for `outcome` in the requested format
///
/// # Errors
/// `NotFound` when an artifact produced by the pipeline is no longer on disk.
pub async fn deliver(outcome: &TranscriptionOutcome, format: ResponseFormat) -> Result<TranscriptionResponse> {
    let artifacts = &outcome.artifacts;

    let payload = match format {
        ResponseFormat::Paths => ArtifactPayload::Paths {
            midi_file_path: path_string(&artifacts.midi)?,
            midi_audio_path: artifacts.audio.as_deref().map(path_string).transpose()?,
            midi_score_path: artifacts.score.as_deref().map(path_string).transpose()?,
            midi_plot_path: artifacts.plot.as_deref().map(path_string).transpose()?,
        },
        ResponseFormat::Base64 => ArtifactPayload::Base64 {
            midi_file_base64: encode_file(&artifacts.midi).await?,
            midi_audio_base64: encode_optional(artifacts.audio.as_deref()).await?,
            midi_score_base64: encode_optional(artifacts.score.as_deref()).await?,
            midi_plot_base64: encode_optional(artifacts.plot.as_deref()).await?,
        },
    };

    Ok(TranscriptionResponse {
        midi_file_name: outcome.midi_file_name(),
        model_type: outcome.model,
        response_format: format,
        note_count: outcome.notes.len(),
        total_time: outcome.notes.total_time(),
        artifacts: payload,
        notes: outcome.notes.clone(),
    })
}
