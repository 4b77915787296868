//! Speech-to-text integration.
//!
//! The pipeline treats transcription as an external collaborator behind the
//! [`SttClient`] trait: production wiring uses the Whisper-compatible HTTP
//! client, tests inject doubles. A transcript replaces the cue's subtitle
//! text when STT is configured.

mod whisper;

pub use whisper::WhisperClient;

use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Contract for transcribing one audio clip.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SttClient: Send + Sync {
    /// Transcribe the clip at `audio_path`.
    ///
    /// `lang_hint` is a BCP-47-ish code passed through to the service;
    /// `initial_prompt` biases decoding toward expected vocabulary. A
    /// deadline overrun surfaces as [`crate::error::LingoError::SttTimeout`].
    async fn transcribe<'a>(
        &'a self,
        audio_path: &'a Path,
        lang_hint: &'a str,
        initial_prompt: Option<&'a str>,
    ) -> Result<String>;

    /// Model identifier, used in artifact naming.
    fn model_name(&self) -> &str;
}
