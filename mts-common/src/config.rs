//! Configuration loading and root folder resolution
//!
//! Bootstrap settings are read once at startup. Each value is resolved in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
pub const DEFAULT_SOUNDFONT: &str = "SGM-v2.01-Sal-Guit-Bass-V1.3.sf2";
pub const DEFAULT_SCORE_TITLE: &str = "Transcription made with Music Transcriber";

pub const ENV_CONFIG: &str = "MTS_CONFIG";
pub const ENV_ROOT_FOLDER: &str = "MTS_ROOT_FOLDER";
pub const ENV_SAMPLE_RATE: &str = "SAMPLE_RATE";
pub const ENV_CHECKPOINT_DIR: &str = "MTS_CHECKPOINT_DIR";
pub const ENV_SOUNDFONT_PATH: &str = "MTS_SOUNDFONT_PATH";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; missing values fall back to environment
/// variables and then compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding `input_audio/` and `outputs/`
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    /// Inference and synthesis sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Directory containing one sub-directory per checkpoint id
    pub checkpoint_dir: Option<PathBuf>,
    pub soundfont_path: Option<PathBuf>,
    pub max_upload_bytes: Option<usize>,
    pub inference: InferenceConfig,
    pub tools: ToolsConfig,
    pub render: RenderConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
}

/// How the opaque transcription model is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    /// Spawn an executable per request
    #[default]
    Command,
    /// POST samples to a long-running inference server
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: InferenceBackend,
    /// Executable invoked by the command backend
    pub command: String,
    /// Endpoint used by the http backend
    pub url: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: InferenceBackend::Command,
            command: "mts-infer".to_string(),
            url: None,
        }
    }
}

/// External renderer command lines
///
/// Each value may carry a wrapper, e.g. `mscore = "xvfb-run -a mscore"`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub fluidsynth: String,
    pub mscore: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fluidsynth: "fluidsynth".to_string(),
            mscore: "mscore".to_string(),
        }
    }
}

/// Which derived artifacts are produced after MIDI serialization
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    pub synthesize: bool,
    pub engrave: bool,
    pub plot: bool,
    pub score_title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            synthesize: true,
            engrave: true,
            plot: true,
            score_title: DEFAULT_SCORE_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub inference_secs: u64,
    pub synth_secs: u64,
    pub engrave_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            inference_secs: 600,
            synth_secs: 120,
            engrave_secs: 180,
        }
    }
}

impl TimeoutConfig {
    pub fn inference(&self) -> Duration {
        Duration::from_secs(self.inference_secs)
    }

    pub fn synth(&self) -> Duration {
        Duration::from_secs(self.synth_secs)
    }

    pub fn engrave(&self) -> Duration {
        Duration::from_secs(self.engrave_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default config file location (`~/.config/music-transcriber/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-transcriber").join("config.toml"))
}

/// Load the bootstrap TOML file
///
/// A missing file is not an error: a warning is logged and defaults are
/// used. A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("music-transcriber"))
        .unwrap_or_else(|| PathBuf::from("./music_transcriber_data"))
}

/// Root folder: CLI argument → `MTS_ROOT_FOLDER` → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Some(path) = &toml.root_folder {
        return path.clone();
    }
    default_root_folder()
}

/// Fixed directory layout under the root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub root: PathBuf,
    pub input_dir: PathBuf,
    pub midi_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub score_dir: PathBuf,
    pub plot_dir: PathBuf,
}

impl StorageLayout {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let outputs = root.join("outputs");
        Self {
            input_dir: root.join("input_audio"),
            midi_dir: outputs.join("midi_file"),
            audio_dir: outputs.join("midi_audio"),
            score_dir: outputs.join("midi_score"),
            plot_dir: outputs.join("midi_plot"),
            root,
        }
    }

    /// Create every directory of the layout if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.input_dir,
            &self.midi_dir,
            &self.audio_dir,
            &self.score_dir,
            &self.plot_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, immutable for the life of the process
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub layout: StorageLayout,
    pub port: u16,
    pub sample_rate: u32,
    pub checkpoint_dir: PathBuf,
    pub soundfont_path: PathBuf,
    pub max_upload_bytes: usize,
    pub inference: InferenceConfig,
    pub tools: ToolsConfig,
    pub render: RenderConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    pub fn resolve(cli: &CliOverrides, toml: TomlConfig) -> Result<Self> {
        let root = resolve_root_folder(cli.root_folder.as_deref(), &toml);
        let layout = StorageLayout::from_root(&root);

        let sample_rate = match std::env::var(ENV_SAMPLE_RATE) {
            Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<u32>().map_err(|e| {
                Error::Config(format!("{}='{}' is not a valid rate: {}", ENV_SAMPLE_RATE, raw, e))
            })?,
            _ => toml.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        };
        if sample_rate == 0 {
            return Err(Error::Config("sample_rate must be greater than zero".to_string()));
        }

        let checkpoint_dir = env_path(ENV_CHECKPOINT_DIR)
            .or(toml.checkpoint_dir)
            .unwrap_or_else(|| root.join("checkpoints"));
        let soundfont_path = env_path(ENV_SOUNDFONT_PATH)
            .or(toml.soundfont_path)
            .unwrap_or_else(|| root.join(DEFAULT_SOUNDFONT));

        if toml.inference.backend == InferenceBackend::Http && toml.inference.url.is_none() {
            return Err(Error::Config(
                "inference.backend = \"http\" requires inference.url".to_string(),
            ));
        }

        Ok(Self {
            layout,
            port: cli.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            sample_rate,
            checkpoint_dir,
            soundfont_path,
            max_upload_bytes: toml.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            inference: toml.inference,
            tools: toml.tools,
            render: toml.render,
            timeouts: toml.timeouts,
            logging: toml.logging,
        })
    }

    /// Checkpoint directory for one model (`<checkpoint_dir>/<checkpoint_id>`)
    pub fn checkpoint_path(&self, checkpoint_id: &str) -> PathBuf {
        self.checkpoint_dir.join(checkpoint_id)
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::from_root("/srv/mts");
        assert_eq!(layout.input_dir, PathBuf::from("/srv/mts/input_audio"));
        assert_eq!(layout.midi_dir, PathBuf::from("/srv/mts/outputs/midi_file"));
        assert_eq!(layout.audio_dir, PathBuf::from("/srv/mts/outputs/midi_audio"));
        assert_eq!(layout.score_dir, PathBuf::from("/srv/mts/outputs/midi_score"));
        assert_eq!(layout.plot_dir, PathBuf::from("/srv/mts/outputs/midi_plot"));
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.inference.backend, InferenceBackend::Command);
        assert_eq!(config.tools.mscore, "mscore");
        assert!(config.render.synthesize && config.render.engrave && config.render.plot);
        assert_eq!(config.timeouts.inference_secs, 600);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections_keep_field_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [render]
            engrave = false

            [tools]
            mscore = "xvfb-run -a mscore"
            "#,
        )
        .unwrap();
        assert!(!config.render.engrave);
        assert!(config.render.plot);
        assert_eq!(config.render.score_title, DEFAULT_SCORE_TITLE);
        assert_eq!(config.tools.fluidsynth, "fluidsynth");
        assert_eq!(config.tools.mscore, "xvfb-run -a mscore");
    }
}
