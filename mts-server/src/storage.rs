//! Input audio storage and artifact naming
//!
//! Uploaded audio lands in `input_audio/`; every derived artifact is named
//! `<stem>_transcribed.<ext>` inside its own output directory, so the same
//! input always maps to the same artifact names.

use mts_common::config::StorageLayout;
use mts_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    /// Format from the (case-insensitive) file extension
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("wav") => Ok(AudioFormat::Wav),
            Some("mp3") => Ok(AudioFormat::Mp3),
            _ => Err(Error::InvalidInput(format!(
                "Invalid file type '{}'. Upload a .wav or .mp3 file.",
                filename
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

/// An uploaded audio file persisted under the input directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAudio {
    pub filename: String,
    #[serde(rename = "filepath")]
    pub path: PathBuf,
    #[serde(skip)]
    pub format: AudioFormat,
}

impl StoredAudio {
    /// File name without extension
    pub fn stem(&self) -> &str {
        file_stem(&self.filename)
    }
}

/// Reject names that could escape their directory
///
/// Only a bare file name is accepted: no separators, not `.` or `..`,
/// not empty. Dots inside a name (`my..take.wav`) are fine.
pub fn validate_filename(filename: &str) -> Result<()> {
    let trimmed = filename.trim();
    if trimmed.is_empty()
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains('\0')
        || trimmed == "."
        || trimmed == ".."
    {
        return Err(Error::InvalidInput(format!("Invalid file name '{}'", filename)));
    }
    Ok(())
}

/// Persist uploaded bytes verbatim
///
/// The extension is checked before anything touches the disk. An existing
/// file with the same name is overwritten.
pub async fn ingest(layout: &StorageLayout, filename: &str, bytes: &[u8]) -> Result<StoredAudio> {
    validate_filename(filename)?;
    let format = AudioFormat::from_filename(filename)?;

    let path = layout.input_dir.join(filename);
    tokio::fs::write(&path, bytes).await?;

    info!(filename, bytes = bytes.len(), path = %path.display(), "Stored uploaded audio");

    Ok(StoredAudio {
        filename: filename.to_string(),
        path,
        format,
    })
}

/// Look up a previously ingested file
pub fn locate(layout: &StorageLayout, filename: &str) -> Result<StoredAudio> {
    validate_filename(filename)?;
    let format = AudioFormat::from_filename(filename)?;

    let path = layout.input_dir.join(filename);
    if !path.is_file() {
        return Err(Error::NotFound(format!("File not found: {}", filename)));
    }

    Ok(StoredAudio {
        filename: filename.to_string(),
        path,
        format,
    })
}

/// Kinds of derived output, each with its own directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Midi,
    Audio,
    Score,
    Plot,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Midi,
        ArtifactKind::Audio,
        ArtifactKind::Score,
        ArtifactKind::Plot,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Midi => "mid",
            ArtifactKind::Audio => "wav",
            ArtifactKind::Score => "pdf",
            ArtifactKind::Plot => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Midi => "audio/midi",
            ArtifactKind::Audio => "audio/wav",
            ArtifactKind::Score => "application/pdf",
            ArtifactKind::Plot => "image/png",
        }
    }

    pub fn directory<'a>(&self, layout: &'a StorageLayout) -> &'a Path {
        match self {
            ArtifactKind::Midi => &layout.midi_dir,
            ArtifactKind::Audio => &layout.audio_dir,
            ArtifactKind::Score => &layout.score_dir,
            ArtifactKind::Plot => &layout.plot_dir,
        }
    }

    /// `<stem>_transcribed.<ext>`
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}_transcribed.{}", stem, self.extension())
    }

    pub fn path_for(&self, layout: &StorageLayout, stem: &str) -> PathBuf {
        self.directory(layout).join(self.file_name(stem))
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "midi" => Ok(ArtifactKind::Midi),
            "audio" => Ok(ArtifactKind::Audio),
            "score" => Ok(ArtifactKind::Score),
            "plot" => Ok(ArtifactKind::Plot),
            other => Err(Error::InvalidInput(format!(
                "Unknown artifact kind '{}'. Choose from midi, audio, score or plot.",
                other
            ))),
        }
    }
}

/// Resolve an existing artifact for download
pub fn locate_artifact(layout: &StorageLayout, kind: ArtifactKind, filename: &str) -> Result<PathBuf> {
    validate_filename(filename)?;
    let path = kind.directory(layout).join(filename);
    if !path.is_file() {
        return Err(Error::NotFound(format!("{:?} file not found: {}", kind, filename)));
    }
    Ok(path)
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}
