//! Test Helper Utilities
//!
//! Shared utilities for testing mts-server

#![allow(dead_code)]

pub mod audio_generator;

pub use audio_generator::{generate_test_wav, generate_test_wav_bytes, AudioConfig};

use async_trait::async_trait;
use mts_common::config::{CliOverrides, ServiceConfig, TomlConfig};
use mts_common::{ModelSelector, NoteEvent, NoteSequence, Result};
use mts_server::audio::DecodedAudio;
use mts_server::inference::{ModelRegistry, TranscriptionModel};
use mts_server::Pipeline;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Model returning a fixed sequence and recording how it was called
#[derive(Clone)]
pub struct StubModel {
    notes: NoteSequence,
    delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
    pub last_sample_rate: Arc<AtomicU32>,
}

impl StubModel {
    pub fn new(notes: NoteSequence) -> Self {
        Self {
            notes,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            last_sample_rate: Arc::new(AtomicU32::new(0)),
        }
    }

    /// C major arpeggio with mixed velocities
    pub fn arpeggio() -> Self {
        Self::new(
            NoteSequence::from_events(vec![
                NoteEvent::new(0.0, 0.5, 60, 80),
                NoteEvent::new(0.5, 1.0, 64, 90),
                NoteEvent::new(1.0, 1.5, 67, 100),
                NoteEvent::new(1.5, 2.5, 72, 70),
            ])
            .unwrap(),
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionModel for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn transcribe(&self, audio: &DecodedAudio) -> Result<NoteSequence> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_sample_rate.store(audio.sample_rate, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.notes.clone())
    }
}

/// Temporary root folder with a resolved configuration
///
/// External renderers are disabled unless a test turns them back on.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: ServiceConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_toml(|_| {})
    }

    pub fn with_toml(customize: impl FnOnce(&mut TomlConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut toml = TomlConfig::default();
        toml.render.synthesize = false;
        toml.render.engrave = false;
        toml.render.plot = true;
        customize(&mut toml);

        let cli = CliOverrides {
            root_folder: Some(dir.path().to_path_buf()),
            port: None,
        };
        let config = ServiceConfig::resolve(&cli, toml).unwrap();
        config.layout.ensure_directories().unwrap();
        Self { dir, config }
    }

    pub fn pipeline(&self, model: StubModel) -> Pipeline {
        let shared: Arc<dyn TranscriptionModel> = Arc::new(model);
        let registry = ModelRegistry::default()
            .with_model(ModelSelector::Piano, shared.clone())
            .with_model(ModelSelector::MultiInstrument, shared);
        Pipeline::new(Arc::new(self.config.clone()), registry).unwrap()
    }

    /// Generate a WAV directly in the input directory
    pub fn write_input_wav(&self, filename: &str, config: &AudioConfig) -> PathBuf {
        generate_test_wav(&self.config.layout.input_dir.join(filename), config).unwrap()
    }

    /// Write an executable shell script and return the `sh <script>` command line
    pub fn script(&self, name: &str, body: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        format!("sh {}", path.display())
    }
}

/// fluidsynth stand-in: writes a stub WAV to the path after `-F`
pub const FAKE_FLUIDSYNTH: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    -F) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf 'RIFF' > "$out"
"#;

/// mscore stand-in: `<in> -o <out>`; emits minimal MusicXML for `.xml`
/// outputs and copies the (titled) XML for `.pdf` outputs
pub const FAKE_MSCORE: &str = r#"
in="$1"
out="$3"
case "$out" in
  *.xml) printf '<?xml version="1.0" encoding="UTF-8"?>\n<score-partwise version="3.1">\n  <part-list/>\n</score-partwise>\n' > "$out" ;;
  *.pdf) cp "$in" "$out" ;;
esac
"#;
