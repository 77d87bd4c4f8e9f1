//! Audio loading for inference
//!
//! Decodes a stored file to mono f32 and brings it to the inference rate.

pub mod decoder;
pub mod resampler;

pub use decoder::{decode_audio_file, DecodedAudio};
pub use resampler::Resampler;

use crate::storage::AudioFormat;
use mts_common::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Decode `path` to mono samples at `target_rate`
///
/// # Errors
/// * `NotFound` - file does not exist
/// * `InvalidInput` - extension is not wav/mp3
/// * `Processing { stage: "decode" }` - probe, decode or resample failure
pub fn decode_for_inference(path: &Path, target_rate: u32) -> Result<DecodedAudio> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("Audio file not found: {}", path.display())));
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    AudioFormat::from_filename(name)?;

    let decoded = decode_audio_file(path)?;
    if decoded.sample_rate == target_rate {
        return Ok(decoded);
    }

    let samples = Resampler::resample_mono(&decoded.samples, decoded.sample_rate, target_rate)?;
    debug!(
        from = decoded.sample_rate,
        to = target_rate,
        frames_in = decoded.samples.len(),
        frames_out = samples.len(),
        "Resampled for inference"
    );

    Ok(DecodedAudio {
        duration_seconds: samples.len() as f64 / target_rate as f64,
        samples,
        sample_rate: target_rate,
        channels: decoded.channels,
        source_sample_rate: decoded.source_sample_rate,
    })
}
