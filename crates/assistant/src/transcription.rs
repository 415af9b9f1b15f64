//! Voice-note transcription.
//!
//! Same proxy shape as the chat pipeline: authenticate, check that an
//! upstream is configured, decode, forward. Failures are reported in the
//! payload.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hikewise_config::AppConfig;
use hikewise_core::{AudioUpload, CallerCredential, IdentityResolver, SpeechToText, UpstreamError};
use hikewise_providers::WhisperClient;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

pub const DEFAULT_MIME_TYPE: &str = "audio/m4a";
pub const DEFAULT_FILE_NAME: &str = "recording.m4a";
pub const DEFAULT_MODEL: &str = "whisper-1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscribeRequest {
    #[serde(alias = "audioBase64")]
    pub audio_base64: String,

    #[serde(default, alias = "mimeType")]
    pub mime_type: Option<String>,

    #[serde(default, alias = "fileName")]
    pub file_name: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: Option<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl TranscribeResponse {
    fn ok(text: String) -> Self {
        Self {
            text: Some(text),
            error: None,
            details: None,
        }
    }

    fn failed(error: &str, details: Option<String>) -> Self {
        Self {
            text: None,
            error: Some(error.into()),
            details,
        }
    }
}

pub struct TranscriptionService {
    identity: Arc<dyn IdentityResolver>,
    backend: Option<Arc<dyn SpeechToText>>,
}

impl TranscriptionService {
    pub fn new(identity: Arc<dyn IdentityResolver>, backend: Option<Arc<dyn SpeechToText>>) -> Self {
        Self { identity, backend }
    }

    /// Wire the speech-to-text client when a key is configured.
    pub fn from_config(
        config: &AppConfig,
        identity: Arc<dyn IdentityResolver>,
    ) -> Result<Self, UpstreamError> {
        let backend: Option<Arc<dyn SpeechToText>> =
            match config.transcription_api_key().filter(|k| !k.is_empty()) {
                Some(key) => Some(Arc::new(WhisperClient::new(
                    config.upstream.base_url.as_str(),
                    key,
                    Duration::from_secs(config.upstream.timeout_secs),
                )?)),
                None => {
                    warn!("No API key for transcription, requests will be refused");
                    None
                }
            };
        Ok(Self::new(identity, backend))
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn transcribe(
        &self,
        credential: Option<&CallerCredential>,
        request: TranscribeRequest,
    ) -> TranscribeResponse {
        match self.identity.resolve(credential).await {
            Ok(Some(_)) => {}
            Ok(None) => return TranscribeResponse::failed("Authentication failed", None),
            Err(e) => {
                error!("Identity lookup failed: {e}");
                return TranscribeResponse::failed("Authentication failed", None);
            }
        }

        let Some(backend) = &self.backend else {
            return TranscribeResponse::failed("Transcription service not configured", None);
        };

        let bytes = match STANDARD.decode(request.audio_base64.trim()) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return TranscribeResponse::failed("Invalid audio payload", None),
            Err(e) => {
                return TranscribeResponse::failed("Invalid audio payload", Some(e.to_string()));
            }
        };

        let upload = AudioUpload {
            bytes,
            mime_type: non_blank(request.mime_type).unwrap_or_else(|| DEFAULT_MIME_TYPE.into()),
            file_name: non_blank(request.file_name).unwrap_or_else(|| DEFAULT_FILE_NAME.into()),
            model: non_blank(request.model).unwrap_or_else(|| DEFAULT_MODEL.into()),
        };

        match backend.transcribe(upload).await {
            Ok(text) => TranscribeResponse::ok(text),
            Err(e) => {
                warn!(kind = e.kind(), "Transcription failed: {e}");
                let details = match e {
                    UpstreamError::Status { message, .. } => message,
                    other => other.to_string(),
                };
                TranscribeResponse::failed("Transcription failed", Some(details))
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hikewise_core::{ExternalProfile, StoreIdentityResolver, UserStore};
    use hikewise_store::InMemoryStore;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<AudioUpload>>,
        result: Result<String, UpstreamError>,
    }

    #[async_trait]
    impl SpeechToText for Recording {
        async fn transcribe(&self, audio: AudioUpload) -> Result<String, UpstreamError> {
            self.seen.lock().unwrap().push(audio);
            self.result.clone()
        }
    }

    async fn identity() -> Arc<dyn IdentityResolver> {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_user(&ExternalProfile {
                subject: "sub_voice".into(),
                email: Some("voice@example.edu".into()),
                ..ExternalProfile::default()
            })
            .await
            .unwrap();
        Arc::new(StoreIdentityResolver::new(store))
    }

    fn backend(result: Result<String, UpstreamError>) -> Arc<Recording> {
        Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            result,
        })
    }

    fn request(audio: &str) -> TranscribeRequest {
        TranscribeRequest {
            audio_base64: audio.into(),
            ..TranscribeRequest::default()
        }
    }

    #[tokio::test]
    async fn decodes_and_applies_defaults() {
        let stt = backend(Ok("notes for chem".into()));
        let service = TranscriptionService::new(identity().await, Some(stt.clone()));
        let cred = CallerCredential::new("sub_voice");

        let out = service.transcribe(Some(&cred), request(&STANDARD.encode(b"RIFF"))).await;
        assert_eq!(out.text.as_deref(), Some("notes for chem"));
        assert!(out.error.is_none());

        let seen = stt.seen.lock().unwrap();
        assert_eq!(seen[0].bytes, b"RIFF");
        assert_eq!(seen[0].mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(seen[0].file_name, DEFAULT_FILE_NAME);
        assert_eq!(seen[0].model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn unauthenticated_is_rejected_first() {
        let service = TranscriptionService::new(identity().await, None);
        let out = service.transcribe(None, request("AAAA")).await;
        assert_eq!(out.error.as_deref(), Some("Authentication failed"));
        assert!(out.text.is_none());
    }

    #[tokio::test]
    async fn unconfigured_backend_is_reported() {
        let service = TranscriptionService::new(identity().await, None);
        let cred = CallerCredential::new("sub_voice");
        let out = service.transcribe(Some(&cred), request("AAAA")).await;
        assert_eq!(out.error.as_deref(), Some("Transcription service not configured"));
    }

    #[tokio::test]
    async fn bad_base64_is_invalid_payload() {
        let service = TranscriptionService::new(identity().await, Some(backend(Ok(String::new()))));
        let cred = CallerCredential::new("sub_voice");
        let out = service.transcribe(Some(&cred), request("%%% not base64")).await;
        assert_eq!(out.error.as_deref(), Some("Invalid audio payload"));
    }

    #[tokio::test]
    async fn upstream_failure_carries_details() {
        let stt = backend(Err(UpstreamError::Status {
            status_code: 400,
            message: "Invalid file format.".into(),
        }));
        let service = TranscriptionService::new(identity().await, Some(stt));
        let cred = CallerCredential::new("sub_voice");
        let out = service.transcribe(Some(&cred), request(&STANDARD.encode(b"x"))).await;
        assert_eq!(out.error.as_deref(), Some("Transcription failed"));
        assert_eq!(out.details.as_deref(), Some("Invalid file format."));

        let json = serde_json::to_value(&out).unwrap();
        assert!(json["text"].is_null());
    }
}
