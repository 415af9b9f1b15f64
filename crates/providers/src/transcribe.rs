//! Speech-to-text over the `audio/transcriptions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use hikewise_core::{AudioUpload, SpeechToText, UpstreamError};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::http::{build_client, network_error, normalize_base_url, read_json};

pub struct WhisperClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    #[serde(default)]
    text: String,
}

impl WhisperClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: normalize_base_url(&base_url.into()),
            api_key: api_key.into(),
            timeout,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio: AudioUpload) -> std::result::Result<String, UpstreamError> {
        if self.api_key.is_empty() {
            return Err(UpstreamError::NotConfigured("transcription api key".into()));
        }

        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!(
            bytes = audio.bytes.len(),
            mime = %audio.mime_type,
            model = %audio.model,
            "Sending transcription request"
        );

        let file = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime_type)
            .map_err(|e| UpstreamError::Network(format!("Invalid audio mime type: {e}")))?;
        let form = Form::new()
            .part("file", file)
            .text("model", audio.model)
            .text("response_format", "json");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network_error(e, self.timeout))?;

        let body: TranscriptionBody = read_json(response, "transcription", self.timeout).await?;
        Ok(body.text)
    }
}
