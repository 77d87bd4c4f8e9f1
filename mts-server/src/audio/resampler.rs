//! Audio resampling using rubato
//!
//! Converts decoded mono audio to the inference sample rate.

use mts_common::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Mono resampler
pub struct Resampler;

impl Resampler {
    /// Resample a mono buffer from `input_rate` to `output_rate`
    ///
    /// The whole buffer is processed as one chunk. Equal rates return a
    /// copy; an empty buffer returns an empty buffer.
    pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == 0 || output_rate == 0 {
            return Err(Error::processing(
                "decode",
                format!("invalid sample rate conversion {} -> {}", input_rate, output_rate),
            ));
        }
        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.to_vec());
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input.len(),
            1,
        )
        .map_err(|e| Error::processing("decode", format!("failed to create resampler: {}", e)))?;

        let mut output = resampler
            .process(&[input], None)
            .map_err(|e| Error::processing("decode", format!("resampling failed: {}", e)))?;

        Ok(output.pop().unwrap_or_default())
    }
}
