//! mts-transcribe - one-shot transcription from the command line
//!
//! Copies an audio file into the input directory, runs the same pipeline
//! as the server and prints where the artifacts landed.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mts_common::config::{self, CliOverrides, ServiceConfig};
use mts_common::ModelSelector;
use mts_server::delivery::{deliver, ResponseFormat};
use mts_server::{storage, Pipeline, TranscribeRequest};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mts-transcribe")]
#[command(about = "Transcribe a .wav or .mp3 file to MIDI, audio preview, score and piano roll")]
#[command(version)]
struct Args {
    /// Audio file to transcribe
    audio: PathBuf,

    /// Model selector (piano or multi-instrument); prompted for when absent
    #[arg(short, long)]
    model: Option<String>,

    /// Payload format used with --json
    #[arg(short, long, default_value = "paths")]
    format: String,

    /// Print the full response as JSON
    #[arg(long)]
    json: bool,

    /// Bootstrap TOML file
    #[arg(short, long, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Folder holding input_audio/ and outputs/
    #[arg(short, long, env = config::ENV_ROOT_FOLDER)]
    root_folder: Option<PathBuf>,
}

/// Ask on stdin until a valid selector is given; empty input means piano
fn prompt_for_model() -> Result<ModelSelector> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    loop {
        print!("Choose a model (piano / multi-instrument) [piano]: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(ModelSelector::default());
        }
        let choice = line.trim();
        if choice.is_empty() {
            return Ok(ModelSelector::default());
        }
        match choice.parse::<ModelSelector>() {
            Ok(selector) => return Ok(selector),
            Err(e) => eprintln!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);
    let toml_config = match &config_path {
        Some(path) => config::load_toml_config(path)?,
        None => Default::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mts_server=warn,mts_common=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let format: ResponseFormat = args.format.parse()?;
    let model: ModelSelector = match args.model.as_deref() {
        Some(raw) => raw.parse()?,
        None => prompt_for_model()?,
    };

    let filename = match args.audio.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => bail!("{} is not a file path", args.audio.display()),
    };
    storage::AudioFormat::from_filename(&filename)?;

    let cli = CliOverrides {
        root_folder: args.root_folder,
        port: None,
    };
    let service_config = ServiceConfig::resolve(&cli, toml_config).context("Invalid configuration")?;
    let pipeline = Pipeline::from_config(service_config).context("Failed to initialize pipeline")?;

    let bytes = tokio::fs::read(&args.audio)
        .await
        .with_context(|| format!("Failed to read {}", args.audio.display()))?;
    let stored = storage::ingest(&pipeline.config().layout, &filename, &bytes).await?;
    info!(path = %stored.path.display(), "Copied input audio");

    let request = TranscribeRequest {
        filename,
        model,
        format,
    };
    let outcome = pipeline.transcribe(&request).await?;

    if args.json {
        let response = deliver(&outcome, format).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let artifacts = &outcome.artifacts;
    println!("Model:       {} ({})", model, model.checkpoint_id());
    println!("Notes:       {}", outcome.notes.len());
    println!("MIDI:        {}", artifacts.midi.display());
    for (label, path) in [
        ("Audio:", &artifacts.audio),
        ("Score:", &artifacts.score),
        ("Plot:", &artifacts.plot),
    ] {
        match path {
            Some(path) => println!("{:<12} {}", label, path.display()),
            None => println!("{:<12} (disabled)", label),
        }
    }
    Ok(())
}
