//! Subtitle cue model and format parsing.
//!
//! A subtitle track is a list of [`Cue`]s ordered by their position in the
//! source file. SRT and ASS/SSA sources are supported; loading decodes the
//! raw bytes (BOM-aware, with a legacy-codepage fallback) before parsing.
//! Cue indices are assigned from source position, not from any numbering
//! embedded in the file.

mod ass;
mod srt;

pub use ass::parse_ass;
pub use srt::{parse_srt, serialize_srt};

use std::path::Path;
use std::time::Duration;

use crate::Result;
use crate::error::LingoError;

/// One subtitle item with start/end timestamps and text lines.
///
/// Cues are immutable during a pipeline run; `index` is the position in the
/// source subtitle list and keys the in-order writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Position in the source subtitle list (0-based).
    pub index: usize,
    /// Start timestamp.
    pub start: Duration,
    /// End timestamp.
    pub end: Duration,
    /// Text lines as they appeared in the source.
    pub lines: Vec<String>,
}

impl Cue {
    /// Join the cue's lines into a single field-safe string.
    ///
    /// Tabs and newlines are collapsed to spaces so the result can be
    /// embedded in a separator-delimited ledger line.
    pub fn joined_text(&self) -> String {
        let joined = self.lines.join(" ");
        joined
            .chars()
            .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether this cue's timing overlaps the given span.
    pub fn overlaps(&self, start: Duration, end: Duration) -> bool {
        self.start < end && start < self.end
    }
}

/// Subtitle file format, derived from extension or content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    /// SubRip (.srt)
    Srt,
    /// Advanced SubStation Alpha (.ass)
    Ass,
    /// SubStation Alpha (.ssa)
    Ssa,
}

impl SubtitleFormat {
    /// The canonical file extension, with leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => ".srt",
            SubtitleFormat::Ass => ".ass",
            SubtitleFormat::Ssa => ".ssa",
        }
    }

    /// Map a format name from a container probe to a subtitle format.
    pub fn from_codec_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ass" | "advanced substation alpha" => Some(SubtitleFormat::Ass),
            "ssa" | "substation alpha" => Some(SubtitleFormat::Ssa),
            "srt" | "subrip" | "utf-8" => Some(SubtitleFormat::Srt),
            _ => None,
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("srt") => Some(SubtitleFormat::Srt),
            Some("ass") => Some(SubtitleFormat::Ass),
            Some("ssa") => Some(SubtitleFormat::Ssa),
            _ => None,
        }
    }
}

/// A parsed subtitle track: ordered cues plus the source format.
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Cues in source order, indices 0..n.
    pub cues: Vec<Cue>,
    /// Format the track was parsed from.
    pub format: SubtitleFormat,
}

impl SubtitleTrack {
    /// Load and parse a subtitle file, decoding its bytes first.
    pub fn load(path: &Path) -> Result<Self> {
        let format = SubtitleFormat::from_path(path).ok_or_else(|| {
            LingoError::subtitle_format(
                "unknown",
                format!("unrecognized subtitle extension: {}", path.display()),
            )
        })?;
        let bytes = std::fs::read(path)?;
        let content = decode_bytes(&bytes);
        let cues = match format {
            SubtitleFormat::Srt => parse_srt(&content)?,
            SubtitleFormat::Ass | SubtitleFormat::Ssa => parse_ass(&content)?,
        };
        Ok(SubtitleTrack { cues, format })
    }

    /// Find the first cue whose timing overlaps `[start, end]`.
    pub fn find_overlapping(&self, start: Duration, end: Duration) -> Option<&Cue> {
        self.cues.iter().find(|c| c.overlaps(start, end))
    }
}

/// Decode subtitle bytes: honor a BOM when present, then try strict UTF-8,
/// then fall back to windows-1252.
fn decode_bytes(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _, _) = encoding.decode(&bytes[bom_len..]);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}
