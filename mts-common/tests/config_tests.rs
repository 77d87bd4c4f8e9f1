//! Configuration resolution tests
//!
//! Covers:
//! - Missing TOML files fall back to defaults instead of failing
//! - Priority order CLI → ENV → TOML → default
//! - Directory layout creation
//!
//! Tests that touch MTS_* / SAMPLE_RATE variables are marked #[serial] so
//! they never race each other.

use mts_common::config::{
    load_toml_config, resolve_root_folder, CliOverrides, InferenceBackend, ServiceConfig,
    StorageLayout, TomlConfig, DEFAULT_PORT, DEFAULT_SAMPLE_RATE, ENV_CHECKPOINT_DIR,
    ENV_ROOT_FOLDER, ENV_SAMPLE_RATE, ENV_SOUNDFONT_PATH,
};
use mts_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn clear_env() {
    for name in [ENV_ROOT_FOLDER, ENV_SAMPLE_RATE, ENV_CHECKPOINT_DIR, ENV_SOUNDFONT_PATH] {
        env::remove_var(name);
    }
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let config = load_toml_config(Path::new("/nonexistent/mts/config.toml")).unwrap();
    assert!(config.root_folder.is_none());
    assert!(config.port.is_none());
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_config_file_values_are_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        root_folder = "/data/mts"
        port = 9100
        sample_rate = 22050

        [inference]
        backend = "http"
        url = "http://127.0.0.1:9200/transcribe"

        [timeouts]
        synth_secs = 5
        "#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/data/mts")));
    assert_eq!(config.port, Some(9100));
    assert_eq!(config.sample_rate, Some(22050));
    assert_eq!(config.inference.backend, InferenceBackend::Http);
    assert_eq!(config.timeouts.synth_secs, 5);
    assert_eq!(config.timeouts.engrave_secs, 180);
}

#[test]
#[serial]
fn test_cli_argument_beats_env_and_toml() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    let root = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
    assert_eq!(root, PathBuf::from("/from/cli"));
    clear_env();
}

#[test]
#[serial]
fn test_env_beats_toml() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/env"));
    clear_env();
}

#[test]
#[serial]
fn test_toml_beats_default() {
    clear_env();
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_resolve_defaults_derive_from_root() {
    clear_env();
    let cli = CliOverrides {
        root_folder: Some(PathBuf::from("/srv/mts")),
        port: None,
    };

    let config = ServiceConfig::resolve(&cli, TomlConfig::default()).unwrap();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
    assert_eq!(config.checkpoint_dir, PathBuf::from("/srv/mts/checkpoints"));
    assert_eq!(
        config.checkpoint_path("ismir2021"),
        PathBuf::from("/srv/mts/checkpoints/ismir2021")
    );
    assert!(config.soundfont_path.starts_with("/srv/mts"));
    assert_eq!(config.layout, StorageLayout::from_root("/srv/mts"));
}

#[test]
#[serial]
fn test_sample_rate_from_env() {
    clear_env();
    env::set_var(ENV_SAMPLE_RATE, "22050");
    let toml = TomlConfig {
        sample_rate: Some(44100),
        ..TomlConfig::default()
    };

    let config = ServiceConfig::resolve(&CliOverrides::default(), toml).unwrap();
    assert_eq!(config.sample_rate, 22050);
    clear_env();
}

#[test]
#[serial]
fn test_invalid_sample_rate_env_is_config_error() {
    clear_env();
    env::set_var(ENV_SAMPLE_RATE, "sixteen thousand");

    let err = ServiceConfig::resolve(&CliOverrides::default(), TomlConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    clear_env();
}

#[test]
#[serial]
fn test_http_backend_requires_url() {
    clear_env();
    let mut toml = TomlConfig::default();
    toml.inference.backend = InferenceBackend::Http;

    let err = ServiceConfig::resolve(&CliOverrides::default(), toml).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_ensure_directories_creates_layout() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::from_root(dir.path().join("root"));

    layout.ensure_directories().unwrap();

    for path in [
        &layout.input_dir,
        &layout.midi_dir,
        &layout.audio_dir,
        &layout.score_dir,
        &layout.plot_dir,
    ] {
        assert!(path.is_dir(), "{} should exist", path.display());
    }
}
