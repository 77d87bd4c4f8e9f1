//! Audio preview synthesis with fluidsynth

use crate::process::{remove_stale_output, require_output, run_tool, ToolCommand};
use mts_common::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

fn synth_args(soundfont: &Path, midi: &Path, output: &Path, sample_rate: u32) -> Vec<OsString> {
    vec![
        "-ni".into(),
        "-F".into(),
        output.as_os_str().to_owned(),
        "-r".into(),
        sample_rate.to_string().into(),
        soundfont.as_os_str().to_owned(),
        midi.as_os_str().to_owned(),
    ]
}

/// Render `midi` to a WAV file through a soundfont
///
/// # Errors
/// * `NotFound` - soundfont or MIDI file missing
/// * `ExternalTool` - fluidsynth failed or wrote nothing
/// * `Timeout` - synthesis exceeded `timeout`
pub async fn synthesize_audio(
    tool: &ToolCommand,
    soundfont: &Path,
    midi: &Path,
    output: &Path,
    sample_rate: u32,
    timeout: Duration,
) -> Result<PathBuf> {
    if !soundfont.is_file() {
        return Err(Error::NotFound(format!("Soundfont not found: {}", soundfont.display())));
    }
    if !midi.is_file() {
        return Err(Error::NotFound(format!("MIDI file not found: {}", midi.display())));
    }

    remove_stale_output(output).await?;
    run_tool(tool, synth_args(soundfont, midi, output, sample_rate), "synthesize", timeout).await?;
    require_output(tool, output)?;

    info!(output = %output.display(), sample_rate, "Synthesized audio preview");
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_argument_order() {
        let args = synth_args(
            Path::new("/sf/gm.sf2"),
            Path::new("/out/song_transcribed.mid"),
            Path::new("/out/song_transcribed.wav"),
            16000,
        );
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-ni",
                "-F",
                "/out/song_transcribed.wav",
                "-r",
                "16000",
                "/sf/gm.sf2",
                "/out/song_transcribed.mid"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_soundfont_is_not_found() {
        let dir = TempDir::new().unwrap();
        let midi = dir.path().join("a.mid");
        std::fs::write(&midi, b"MThd").unwrap();

        let err = synthesize_audio(
            &ToolCommand::parse("fluidsynth").unwrap(),
            &dir.path().join("missing.sf2"),
            &midi,
            &dir.path().join("a.wav"),
            16000,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_that_writes_nothing_is_external_tool_error() {
        let dir = TempDir::new().unwrap();
        let midi = dir.path().join("a.mid");
        let soundfont = dir.path().join("gm.sf2");
        std::fs::write(&midi, b"MThd").unwrap();
        std::fs::write(&soundfont, b"RIFF").unwrap();

        let err = synthesize_audio(
            &ToolCommand::parse("true").unwrap(),
            &soundfont,
            &midi,
            &dir.path().join("a.wav"),
            16000,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_previous_output_is_not_reused() {
        let dir = TempDir::new().unwrap();
        let midi = dir.path().join("a.mid");
        let soundfont = dir.path().join("gm.sf2");
        let output = dir.path().join("a.wav");
        std::fs::write(&midi, b"MThd").unwrap();
        std::fs::write(&soundfont, b"RIFF").unwrap();
        std::fs::write(&output, b"RIFF from an earlier run").unwrap();

        let err = synthesize_audio(
            &ToolCommand::parse("true").unwrap(),
            &soundfont,
            &midi,
            &output,
            16000,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
        assert!(!output.exists());
    }
}
