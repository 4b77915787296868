//! Container probing via the mediainfo binary.
//!
//! `mediainfo --Output=JSON` reports one track object per stream; this module
//! parses that report into the typed model the selection layer consumes.
//! Unknown `@type` values are ignored so new mediainfo versions do not break
//! probing.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

use crate::Result;
use crate::core::language::{LangTag, LanguageResolver};
use crate::error::LingoError;

/// Probe result for one media container.
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    /// Container-level metadata.
    pub general: Option<GeneralInfo>,
    /// Video streams in stream order.
    pub video: Vec<VideoInfo>,
    /// Audio streams in stream order.
    pub audio: Vec<AudioInfo>,
    /// Text (subtitle) streams in stream order.
    pub text: Vec<TextInfo>,
}

/// Container-level metadata.
#[derive(Debug, Clone, Default)]
pub struct GeneralInfo {
    /// Container format name (e.g., "Matroska").
    pub format: String,
    /// Duration in milliseconds, when reported.
    pub duration_ms: Option<u64>,
}

/// One video stream.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    /// 0-based index within the container's stream order.
    pub stream_index: usize,
    /// Codec format name.
    pub format: String,
}

/// One audio stream, as consumed by audio-track selection.
#[derive(Debug, Clone)]
pub struct AudioInfo {
    /// 0-based index within the container's stream order.
    pub stream_index: usize,
    /// Resolved language tag (`und` when untagged).
    pub language: LangTag,
    /// Channel count; 2 is preferred for intelligibility.
    pub channel_count: u32,
    /// Stream title, when present.
    pub title: Option<String>,
}

/// One embedded text stream, as consumed by subtitle-source indexing.
#[derive(Debug, Clone)]
pub struct TextInfo {
    /// 0-based index within the container's stream order.
    pub stream_index: usize,
    /// Resolved language tag (`und` when untagged).
    pub language: LangTag,
    /// Codec format name (e.g., "ASS", "UTF-8").
    pub format: String,
    /// Codec identifier (e.g., "S_TEXT/ASS").
    pub codec_id: Option<String>,
    /// Stream title, when present.
    pub title: Option<String>,
    /// Whether the stream carries the default disposition.
    pub is_default: bool,
}

/// Contract for container probing; production uses the mediainfo binary,
/// tests inject parsed fixtures.
#[async_trait]
pub trait MediaInfoProvider: Send + Sync {
    /// Probe one media file.
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// Production probe backed by the mediainfo CLI.
#[derive(Debug, Clone)]
pub struct MediaInfoCli {
    binary: String,
}

impl Default for MediaInfoCli {
    fn default() -> Self {
        Self {
            binary: "mediainfo".to_string(),
        }
    }
}

impl MediaInfoCli {
    /// Use a specific binary name or path.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MediaInfoProvider for MediaInfoCli {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        if !path.exists() {
            return Err(LingoError::FileNotFound(path.display().to_string()));
        }
        debug!("{} --Output=JSON {}", self.binary, path.display());
        let output = Command::new(&self.binary)
            .arg("--Output=JSON")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| LingoError::command_failed(&self.binary, e.to_string()))?;

        if !output.status.success() {
            return Err(LingoError::media_probe(format!(
                "{} exited with {} for {}",
                self.binary,
                output.status,
                path.display()
            )));
        }
        parse_report(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
struct RawReport {
    media: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(default)]
    track: Vec<RawTrack>,
}

// mediainfo reports every numeric field as a string.
#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "StreamOrder")]
    stream_order: Option<String>,
    #[serde(rename = "Format")]
    format: Option<String>,
    #[serde(rename = "CodecID")]
    codec_id: Option<String>,
    #[serde(rename = "Language")]
    language: Option<String>,
    #[serde(rename = "Channels")]
    channels: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Default")]
    default: Option<String>,
    #[serde(rename = "Duration")]
    duration: Option<String>,
}

/// Parse a `mediainfo --Output=JSON` report.
pub fn parse_report(json: &str) -> Result<MediaInfo> {
    let raw: RawReport = serde_json::from_str(json)?;
    let resolver = LanguageResolver::new();
    let mut info = MediaInfo::default();

    let tracks = raw.media.map(|m| m.track).unwrap_or_default();
    for track in tracks {
        let stream_index = track
            .stream_order
            .as_deref()
            .and_then(|s| s.parse::<usize>().ok());
        let language = resolver.resolve_or_und(track.language.as_deref().unwrap_or(""));

        match track.kind.as_str() {
            "General" => {
                info.general = Some(GeneralInfo {
                    format: track.format.clone().unwrap_or_default(),
                    duration_ms: track
                        .duration
                        .as_deref()
                        .and_then(|d| d.parse::<f64>().ok())
                        .map(|secs| (secs * 1000.0) as u64),
                });
            }
            "Video" => {
                info.video.push(VideoInfo {
                    stream_index: stream_index.unwrap_or(info.video.len()),
                    format: track.format.clone().unwrap_or_default(),
                });
            }
            "Audio" => {
                info.audio.push(AudioInfo {
                    stream_index: stream_index.unwrap_or(0),
                    language,
                    channel_count: track
                        .channels
                        .as_deref()
                        .and_then(|c| c.parse().ok())
                        .unwrap_or(0),
                    title: track.title.clone(),
                });
            }
            "Text" => {
                info.text.push(TextInfo {
                    stream_index: stream_index.unwrap_or(0),
                    language,
                    format: track.format.clone().unwrap_or_default(),
                    codec_id: track.codec_id.clone(),
                    title: track.title.clone(),
                    is_default: track.default.as_deref() == Some("Yes"),
                });
            }
            // Menu, Image, chapters: not our concern.
            _ => {}
        }
    }

    Ok(info)
}
