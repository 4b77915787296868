//! Whisper-compatible HTTP transcription client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, multipart::Form};
use serde::Deserialize;
use tokio::fs::File;
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::Result;
use crate::config::SttConfig;
use crate::error::LingoError;
use crate::services::stt::SttClient;

/// Client for an OpenAI-compatible `audio/transcriptions` endpoint.
pub struct WhisperClient {
    client: Client,
    api_key: String,
    base_url: String,
    config: SttConfig,
}

impl WhisperClient {
    /// Build a client; the per-request deadline comes from
    /// `config.timeout_seconds`.
    pub fn new(api_key: String, base_url: String, config: SttConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LingoError::stt(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
            config,
        })
    }

    async fn try_transcribe(
        &self,
        audio_path: &Path,
        lang_hint: &str,
        initial_prompt: Option<&str>,
    ) -> Result<String> {
        let file = File::open(audio_path)
            .await
            .map_err(|e| LingoError::stt(format!("failed to open audio clip: {}", e)))?;
        let stream = FramedRead::new(file, BytesCodec::new());
        let body = reqwest::Body::wrap_stream(stream);

        let filename = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "clip.ogg".to_string());
        let mime = if filename.ends_with(".wav") {
            "audio/wav"
        } else {
            "audio/ogg"
        };
        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part(
                "file",
                reqwest::multipart::Part::stream(body)
                    .file_name(filename)
                    .mime_str(mime)
                    .map_err(|e| LingoError::stt(e.to_string()))?,
            );

        if !lang_hint.is_empty() && lang_hint != "und" {
            form = form.text("language", lang_hint.to_string());
        }
        if let Some(prompt) = initial_prompt {
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LingoError::SttTimeout {
                        seconds: self.config.timeout_seconds,
                    }
                } else {
                    LingoError::stt(format!("transcription request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LingoError::stt(format!(
                "transcription API error {}: {}",
                status, text
            )));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| LingoError::stt(format!("failed to parse transcription: {}", e)))?;
        Ok(result.text.trim().to_string())
    }
}

#[async_trait]
impl SttClient for WhisperClient {
    /// Transcribe with retries. Timeouts are not retried: the configured
    /// deadline is the caller's abort contract, and retrying would multiply
    /// it.
    async fn transcribe<'a>(
        &'a self,
        audio_path: &'a Path,
        lang_hint: &'a str,
        initial_prompt: Option<&'a str>,
    ) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self
                .try_transcribe(audio_path, lang_hint, initial_prompt)
                .await
            {
                Ok(text) => {
                    debug!(
                        "transcribed {} ({} chars, attempt {})",
                        audio_path.display(),
                        text.len(),
                        attempt + 1
                    );
                    return Ok(text);
                }
                Err(e @ LingoError::SttTimeout { .. }) => return Err(e),
                Err(e) => {
                    warn!(
                        "transcription attempt {} failed for {}: {}",
                        attempt + 1,
                        audio_path.display(),
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| LingoError::stt("unknown transcription error")))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SttConfig;

    fn test_config() -> SttConfig {
        SttConfig {
            max_retries: 1,
            retry_delay_ms: 1,
            ..SttConfig::default()
        }
    }

    #[tokio::test]
    async fn test_whisper_client_creation() {
        let client = WhisperClient::new(
            "key".into(),
            "https://api.openai.com/v1".into(),
            test_config(),
        );
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_transcribe_success_via_mock_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": " こんにちは "})),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.ogg");
        std::fs::write(&clip, b"fake-ogg-bytes").unwrap();

        let client = WhisperClient::new("key".into(), server.uri(), test_config()).unwrap();
        let text = client.transcribe(&clip, "ja", None).await.unwrap();
        assert_eq!(text, "こんにちは");
    }

    #[tokio::test]
    async fn test_transcribe_retries_then_fails() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(2) // initial attempt + one retry
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.ogg");
        std::fs::write(&clip, b"fake-ogg-bytes").unwrap();

        let client = WhisperClient::new("key".into(), server.uri(), test_config()).unwrap();
        let err = client.transcribe(&clip, "ja", None).await.unwrap_err();
        assert!(matches!(err, LingoError::Stt { .. }));
    }

    #[tokio::test]
    async fn test_missing_clip_is_stt_error() {
        let client =
            WhisperClient::new("key".into(), "http://localhost:1".into(), test_config()).unwrap();
        let err = client
            .transcribe(Path::new("/nonexistent/clip.ogg"), "ja", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LingoError::Stt { .. }));
    }
}
