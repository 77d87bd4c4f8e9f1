//! Executable-backed transcription model
//!
//! Invocation:
//! `<command> --checkpoint <dir> --model-type <id> --input <wav> --output <json>`
//!
//! The samples are handed over as a mono 32-bit float WAV; the executable
//! writes its notes as JSON. Both files are scratch files removed after
//! the call whatever its outcome.

use super::{parse_notes, TranscriptionModel};
use crate::audio::DecodedAudio;
use crate::process::{run_tool, ScratchFile, ToolCommand};
use async_trait::async_trait;
use mts_common::{Error, ModelSelector, NoteSequence, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub struct CommandModel {
    tool: ToolCommand,
    selector: ModelSelector,
    checkpoint: PathBuf,
    sample_rate: u32,
    timeout: Duration,
}

impl CommandModel {
    pub fn new(
        command_line: &str,
        selector: ModelSelector,
        checkpoint: PathBuf,
        sample_rate: u32,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            tool: ToolCommand::parse(command_line)?,
            selector,
            checkpoint,
            sample_rate,
            timeout,
        })
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "--checkpoint".into(),
            self.checkpoint.clone().into_os_string(),
            "--model-type".into(),
            self.selector.checkpoint_id().into(),
            "--input".into(),
            input.as_os_str().to_owned(),
            "--output".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

/// Write mono samples as a 32-bit float WAV
pub fn write_float_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let to_err = |e: hound::Error| Error::processing("inference", format!("failed to write input WAV: {}", e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(to_err)?;
    for sample in samples {
        writer.write_sample(*sample).map_err(to_err)?;
    }
    writer.finalize().map_err(to_err)
}

#[async_trait]
impl TranscriptionModel for CommandModel {
    fn name(&self) -> &str {
        "command"
    }

    async fn transcribe(&self, audio: &DecodedAudio) -> Result<NoteSequence> {
        if audio.sample_rate != self.sample_rate {
            return Err(Error::processing(
                "inference",
                format!(
                    "model expects {} Hz audio, got {} Hz",
                    self.sample_rate, audio.sample_rate
                ),
            ));
        }

        let input = ScratchFile::in_temp_dir("mts_infer_in", "wav");
        let output = ScratchFile::in_temp_dir("mts_infer_out", "json");

        let wav_path = input.path().to_path_buf();
        let samples = audio.samples.clone();
        let rate = audio.sample_rate;
        tokio::task::spawn_blocking(move || write_float_wav(&wav_path, &samples, rate))
            .await
            .map_err(|e| Error::processing("inference", e))??;

        info!(
            model = %self.selector,
            checkpoint = %self.checkpoint.display(),
            samples = audio.samples.len(),
            "Running inference command"
        );

        run_tool(
            &self.tool,
            self.args(input.path(), output.path()),
            "inference",
            self.timeout,
        )
        .await
        .map_err(|e| match e {
            Error::ExternalTool { tool, status, stderr } => Error::processing(
                "inference",
                format!("{} failed ({}): {}", tool, status, stderr),
            ),
            other => other,
        })?;

        let bytes = tokio::fs::read(output.path()).await.map_err(|e| {
            Error::processing("inference", format!("model produced no output: {}", e))
        })?;
        let notes = parse_notes(&bytes)?;

        debug!(model = %self.selector, notes = notes.len(), "Inference complete");
        Ok(notes)
    }
}
