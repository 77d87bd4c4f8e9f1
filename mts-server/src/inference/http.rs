//! HTTP-backed transcription model
//!
//! POSTs `{model_type, sample_rate, samples}` to a long-running inference
//! server and reads `{notes: [...]}` back.

use super::{parse_notes, TranscriptionModel};
use crate::audio::DecodedAudio;
use async_trait::async_trait;
use mts_common::{Error, ModelSelector, NoteSequence, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("music-transcriber/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model_type: &'a str,
    sample_rate: u32,
    samples: &'a [f32],
}

pub struct HttpModel {
    client: reqwest::Client,
    url: String,
    selector: ModelSelector,
    timeout: Duration,
}

impl HttpModel {
    pub fn new(url: String, selector: ModelSelector, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            selector,
            timeout,
        })
    }
}

#[async_trait]
impl TranscriptionModel for HttpModel {
    fn name(&self) -> &str {
        "http"
    }

    async fn transcribe(&self, audio: &DecodedAudio) -> Result<NoteSequence> {
        info!(model = %self.selector, url = %self.url, samples = audio.samples.len(), "Posting audio to inference server");

        let request = InferenceRequest {
            model_type: self.selector.checkpoint_id(),
            sample_rate: audio.sample_rate,
            samples: &audio.samples,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        stage: "inference",
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    Error::processing("inference", format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::processing("inference", format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::processing(
                "inference",
                format!(
                    "inference server returned {}: {}",
                    status,
                    String::from_utf8_lossy(&body).trim()
                ),
            ));
        }

        let notes = parse_notes(&body)?;
        debug!(model = %self.selector, notes = notes.len(), "Inference complete");
        Ok(notes)
    }
}
