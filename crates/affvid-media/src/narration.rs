//! Text-to-speech narration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MediaError;
use crate::videogen::stream_to_file;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speaks `text` into an audio file at `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError`] when synthesis or the file write fails.
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<PathBuf, MediaError>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

/// Client for `POST {base}/v1/audio/speech`.
pub struct OpenAiSpeechClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    voice: String,
}

impl OpenAiSpeechClient {
    /// # Errors
    ///
    /// Returns [`MediaError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        voice: &str,
        timeout_secs: u64,
    ) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/v1/audio/speech", base_url.trim_end_matches('/')),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            voice: voice.to_owned(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechClient {
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<PathBuf, MediaError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                voice: &self.voice,
                input: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.url.clone(),
                body,
            });
        }

        stream_to_file(response, dest).await?;
        tracing::info!(path = %dest.display(), "narration written");
        Ok(dest.to_path_buf())
    }
}
