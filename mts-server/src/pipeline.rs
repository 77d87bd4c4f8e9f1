//! Transcription pipeline
//!
//! Decode → Infer → Serialize → (Synthesize ‖ Engrave ‖ Plot) → Deliver
//!
//! One run per request. The model registry and configuration are shared
//! read-only; CPU-bound stages run on the blocking pool and the three
//! renderers run concurrently once the MIDI file exists.

use crate::audio::decode_for_inference;
use crate::delivery::{deliver, ResponseFormat, TranscriptionResponse};
use crate::inference::ModelRegistry;
use crate::midi::write_midi;
use crate::process::ToolCommand;
use crate::render::{engrave_score, plot_piano_roll, synthesize_audio};
use crate::storage::{self, ArtifactKind};
use mts_common::config::ServiceConfig;
use mts_common::{Error, ModelSelector, NoteSequence, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

/// One transcription job
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    /// Name of a file previously stored in the input directory
    pub filename: String,
    pub model: ModelSelector,
    pub format: ResponseFormat,
}

/// Paths of every artifact produced for one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub midi: PathBuf,
    /// `None` when the renderer is disabled
    pub audio: Option<PathBuf>,
    pub score: Option<PathBuf>,
    pub plot: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub stem: String,
    pub model: ModelSelector,
    pub notes: NoteSequence,
    pub artifacts: ArtifactSet,
}

impl TranscriptionOutcome {
    pub fn midi_file_name(&self) -> String {
        ArtifactKind::Midi.file_name(&self.stem)
    }
}

pub struct Pipeline {
    config: Arc<ServiceConfig>,
    models: ModelRegistry,
    fluidsynth: ToolCommand,
    mscore: ToolCommand,
}

fn join_error(stage: &'static str, e: tokio::task::JoinError) -> Error {
    Error::processing(stage, format!("task failed: {}", e))
}

impl Pipeline {
    pub fn new(config: Arc<ServiceConfig>, models: ModelRegistry) -> Result<Self> {
        Ok(Self {
            fluidsynth: ToolCommand::parse(&config.tools.fluidsynth)?,
            mscore: ToolCommand::parse(&config.tools.mscore)?,
            config,
            models,
        })
    }

    /// Create the directory layout and load one model per selector
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        config.layout.ensure_directories()?;
        let models = ModelRegistry::from_config(&config)?;
        Self::new(Arc::new(config), models)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Transcribe and build the response body
    pub async fn run(&self, request: &TranscribeRequest) -> Result<TranscriptionResponse> {
        let outcome = self.transcribe(request).await?;
        deliver(&outcome, request.format).await
    }

    /// Run every stage up to artifact generation
    ///
    /// The model and the input file are resolved before any decoding, so an
    /// unknown file never reaches the decoder or the model.
    pub async fn transcribe(&self, request: &TranscribeRequest) -> Result<TranscriptionOutcome> {
        let model = self.models.get(request.model)?;
        let input = storage::locate(&self.config.layout, &request.filename)?;
        let stem = input.stem().to_string();

        let span = info_span!("transcribe", file = %request.filename, model = %request.model);
        async move {
            let started = Instant::now();

            let path = input.path.clone();
            let rate = self.config.sample_rate;
            let audio = tokio::task::spawn_blocking(move || decode_for_inference(&path, rate))
                .await
                .map_err(|e| join_error("decode", e))??;
            info!(
                samples = audio.samples.len(),
                source_rate = audio.source_sample_rate,
                channels = audio.channels,
                duration_seconds = format!("{:.2}", audio.duration_seconds),
                "Decoded audio"
            );

            let timeout = self.config.timeouts.inference();
            let notes = tokio::time::timeout(timeout, model.transcribe(&audio))
                .await
                .map_err(|_| Error::Timeout {
                    stage: "inference",
                    seconds: timeout.as_secs(),
                })??;
            info!(notes = notes.len(), backend = model.name(), "Inference complete");

            let midi = {
                let notes = notes.clone();
                let dir = self.config.layout.midi_dir.clone();
                let stem = stem.clone();
                tokio::task::spawn_blocking(move || write_midi(&notes, &dir, &stem))
                    .await
                    .map_err(|e| join_error("midi", e))??
            };
            info!(path = %midi.display(), "Wrote MIDI file");

            let (audio_preview, score, plot) = tokio::join!(
                self.synthesize(&midi, &stem),
                self.engrave(&midi, &stem),
                self.plot(&notes, &stem),
            );
            for (stage, result) in [("synthesize", &audio_preview), ("engrave", &score), ("plot", &plot)] {
                if let Err(e) = result {
                    error!(stage, error = %e, "Renderer failed");
                }
            }

            let artifacts = ArtifactSet {
                midi,
                audio: audio_preview?,
                score: score?,
                plot: plot?,
            };

            info!(elapsed_ms = started.elapsed().as_millis() as u64, "Transcription complete");
            Ok(TranscriptionOutcome {
                stem,
                model: request.model,
                notes,
                artifacts,
            })
        }
        .instrument(span)
        .await
    }

    async fn synthesize(&self, midi: &std::path::Path, stem: &str) -> Result<Option<PathBuf>> {
        if !self.config.render.synthesize {
            return Ok(None);
        }
        let output = ArtifactKind::Audio.path_for(&self.config.layout, stem);
        synthesize_audio(
            &self.fluidsynth,
            &self.config.soundfont_path,
            midi,
            &output,
            self.config.sample_rate,
            self.config.timeouts.synth(),
        )
        .await
        .map(Some)
    }

    async fn engrave(&self, midi: &std::path::Path, stem: &str) -> Result<Option<PathBuf>> {
        if !self.config.render.engrave {
            return Ok(None);
        }
        let output = ArtifactKind::Score.path_for(&self.config.layout, stem);
        engrave_score(
            &self.mscore,
            midi,
            &output,
            &self.config.render.score_title,
            self.config.timeouts.engrave(),
        )
        .await
        .map(Some)
    }

    async fn plot(&self, notes: &NoteSequence, stem: &str) -> Result<Option<PathBuf>> {
        if !self.config.render.plot {
            return Ok(None);
        }
        let output = ArtifactKind::Plot.path_for(&self.config.layout, stem);
        let notes = notes.clone();
        let stem = stem.to_string();
        tokio::task::spawn_blocking(move || plot_piano_roll(&notes, &stem, &output))
            .await
            .map_err(|e| join_error("plot", e))?
            .map(Some)
    }
}
