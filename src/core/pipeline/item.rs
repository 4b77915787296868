//! Per-cue processing: extract an audio clip and a still image, optionally
//! transcribe the clip, and assemble the ledger record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use tokio_util::sync::CancellationToken;

use super::{CueProcessor, ProcessedRecord};
use crate::Result;
use crate::core::paths::timecode;
use crate::core::subtitle::{Cue, SubtitleTrack};
use crate::error::LingoError;
use crate::services::ffmpeg::{artifact_path, AudioClipSpec, ClipFormat, Ffmpeg};
use crate::services::stt::SttClient;

/// Processes one cue into one [`ProcessedRecord`].
///
/// Audio extraction is non-fatal: any failure besides AlreadyExists is
/// logged and processing continues. The still image is the completion
/// marker: an existing image short-circuits the cue as already done, but
/// the record is still emitted with its sound/image references preserved.
pub struct ItemProcessor {
    media_path: PathBuf,
    artifact_prefix: PathBuf,
    source_base: String,
    audio_stream: Option<usize>,
    clip_format: ClipFormat,
    offset_ms: i64,
    foreign: Arc<SubtitleTrack>,
    native: Option<Arc<SubtitleTrack>>,
    ffmpeg: Ffmpeg,
    stt: Option<Arc<dyn SttClient>>,
    stt_lang_hint: String,
    stt_prompt: Option<String>,
}

/// Builder-style constructor arguments for [`ItemProcessor`].
pub struct ItemProcessorParams {
    /// Source media file.
    pub media_path: PathBuf,
    /// Artifact path prefix (media dir + sanitized stem).
    pub artifact_prefix: PathBuf,
    /// Sanitized output base, the `source` record field.
    pub source_base: String,
    /// Audio stream to clip from, when one was selected.
    pub audio_stream: Option<usize>,
    /// Clip format (WAV when the condensed-audio path is active).
    pub clip_format: ClipFormat,
    /// Audio offset in milliseconds.
    pub offset_ms: i64,
    /// Target-language subtitle track.
    pub foreign: Arc<SubtitleTrack>,
    /// Native-language subtitle track, when selected.
    pub native: Option<Arc<SubtitleTrack>>,
    /// ffmpeg wrapper.
    pub ffmpeg: Ffmpeg,
    /// STT client, when transcription is configured.
    pub stt: Option<Arc<dyn SttClient>>,
    /// Language hint forwarded to STT.
    pub stt_lang_hint: String,
    /// Initial prompt forwarded to STT.
    pub stt_prompt: Option<String>,
}

impl ItemProcessor {
    /// Wire up a processor for one task.
    pub fn new(params: ItemProcessorParams) -> Self {
        Self {
            media_path: params.media_path,
            artifact_prefix: params.artifact_prefix,
            source_base: params.source_base,
            audio_stream: params.audio_stream,
            clip_format: params.clip_format,
            offset_ms: params.offset_ms,
            foreign: params.foreign,
            native: params.native,
            ffmpeg: params.ffmpeg,
            stt: params.stt,
            stt_lang_hint: params.stt_lang_hint,
            stt_prompt: params.stt_prompt,
        }
    }

    fn native_text_for(&self, start: Duration, end: Duration) -> String {
        self.native
            .as_ref()
            .and_then(|track| track.find_overlapping(start, end))
            .map(|cue| cue.joined_text())
            .unwrap_or_default()
    }

    fn neighbor(&self, index: usize, delta: i64) -> Option<&Cue> {
        let target = index as i64 + delta;
        if target < 0 {
            return None;
        }
        self.foreign.cues.get(target as usize)
    }
}

#[async_trait]
impl CueProcessor for ItemProcessor {
    async fn process(&self, cancel: &CancellationToken, cue: &Cue) -> Result<ProcessedRecord> {
        let time_tag = timecode(cue.start);
        let clip_path = artifact_path(
            &self.artifact_prefix,
            cue.start,
            self.clip_format.extension(),
        );
        let image_path = artifact_path(&self.artifact_prefix, cue.start, "avif");

        let mut record = ProcessedRecord {
            index: cue.index,
            time_tag: time_tag.clone(),
            source: self.source_base.clone(),
            sound_tag: sound_ref(&clip_path),
            image_tag: image_ref(&image_path),
            foreign_curr: cue.joined_text(),
            native_curr: self.native_text_for(cue.start, cue.end),
            start_time: cue.start,
            ..ProcessedRecord::default()
        };

        // Audio is non-fatal: a clip that cannot be cut still leaves a
        // useful record.
        if let Some(stream_index) = self.audio_stream {
            let spec = AudioClipSpec {
                format: self.clip_format,
                stream_index,
                offset_ms: self.offset_ms,
                start: cue.start,
                end: cue.end,
            };
            match self
                .ffmpeg
                .extract_audio_clip(&self.media_path, &self.artifact_prefix, &spec)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_already_exists() => {}
                Err(e) => warn!("audio clip failed for cue {} ({}): {}", cue.index, time_tag, e),
            }
        }

        match self
            .ffmpeg
            .extract_still(&self.media_path, &self.artifact_prefix, cue.start, cue.end)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {
                record.already_done = true;
            }
            Err(e) => warn!("still failed for cue {} ({}): {}", cue.index, time_tag, e),
        }

        if !record.already_done {
            if let Some(stt) = &self.stt {
                let transcript = tokio::select! {
                    _ = cancel.cancelled() => return Err(LingoError::Cancelled),
                    result = stt.transcribe(
                        &clip_path,
                        &self.stt_lang_hint,
                        self.stt_prompt.as_deref(),
                    ) => result?,
                };
                if !transcript.is_empty() {
                    record.foreign_curr = transcript;
                }
            }
        }

        if let Some(prev) = self.neighbor(cue.index, -1) {
            record.foreign_prev = prev.joined_text();
            record.native_prev = self.native_text_for(prev.start, prev.end);
        }
        if let Some(next) = self.neighbor(cue.index, 1) {
            record.foreign_next = next.joined_text();
            record.native_next = self.native_text_for(next.start, next.end);
        }

        Ok(record)
    }
}

fn sound_ref(clip: &std::path::Path) -> String {
    format!("[sound:{}]", file_name(clip))
}

fn image_ref(image: &std::path::Path) -> String {
    format!("<img src=\"{}\">", file_name(image))
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
