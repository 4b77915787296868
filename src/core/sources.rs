//! Subtitle source indexing: enumerate standalone and embedded candidates,
//! materialize embedded tracks on demand.
//!
//! Standalone candidates are sibling files sharing the media stem; embedded
//! candidates come from the container probe. Every candidate carries a
//! language (possibly `und`) and a subtype ranking so the selector can
//! prefer richer flavors.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::Result;
use crate::core::language::{LangTag, LanguageResolver};
use crate::core::paths::{PathService, is_generated_artifact};
use crate::core::subtitle::SubtitleFormat;
use crate::services::ffmpeg::Ffmpeg;
use crate::services::mediainfo::MediaInfo;

/// Subtitle flavor ranking; higher is richer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubtitleKind {
    /// Plain dialogue subtitles.
    Sub = 0,
    /// SDH with hearing-impaired annotations stripped.
    StrippedSdh = 1,
    /// Dubtitles (transcript of the dub track).
    Dub = 2,
    /// Closed captions.
    Cc = 3,
}

/// Where a candidate's content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleSource {
    /// A standalone subtitle file on disk.
    Standalone {
        /// The subtitle file path.
        path: PathBuf,
    },
    /// A text stream inside a media container.
    Embedded {
        /// The container file.
        container: PathBuf,
        /// Absolute stream index within the container.
        stream_index: usize,
        /// Codec format name from the probe.
        format: String,
        /// Codec identifier from the probe.
        codec_id: Option<String>,
    },
}

/// One selectable subtitle source.
#[derive(Debug, Clone)]
pub struct SubtitleCandidate {
    /// Resolved language (never absent; `und` when unknown).
    pub language: LangTag,
    /// Content location.
    pub source: SubtitleSource,
    /// Default-disposition flag from the container, false for files.
    pub is_default: bool,
    /// Track title or filename-derived label.
    pub title: Option<String>,
    /// Flavor ranking.
    pub subtype: SubtitleKind,
}

static SDH_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(sdh|hi|hearing.?impaired)\b").unwrap());
static CC_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcc\b|closed.?caption").unwrap());
static DUB_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdub(title)?s?\b").unwrap());

/// Classify a subtitle flavor from its title or filename.
pub fn classify_subtype(label: &str) -> SubtitleKind {
    if CC_MARKER.is_match(label) {
        SubtitleKind::Cc
    } else if DUB_MARKER.is_match(label) {
        SubtitleKind::Dub
    } else if SDH_MARKER.is_match(label) {
        SubtitleKind::StrippedSdh
    } else {
        SubtitleKind::Sub
    }
}

const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa"];

/// All subtitle candidates discovered for one media file.
#[derive(Debug, Clone, Default)]
pub struct SubtitleSourceIndex {
    candidates: Vec<SubtitleCandidate>,
}

impl SubtitleSourceIndex {
    /// Enumerate candidates: sibling standalone files first (they are
    /// cheaper to use), then embedded text streams from the probe.
    pub fn build(paths: &PathService, probe: &MediaInfo, resolver: &LanguageResolver) -> Self {
        let mut candidates = Vec::new();

        let media_path = paths.media_path();
        let stem = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(parent) = media_path.parent() {
            if let Ok(entries) = std::fs::read_dir(parent) {
                let mut standalone: Vec<PathBuf> = entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| is_sibling_subtitle(p, &stem))
                    .collect();
                standalone.sort();
                for path in standalone {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let language = resolver.guess_from_path(&path).unwrap_or_else(LangTag::und);
                    candidates.push(SubtitleCandidate {
                        language,
                        subtype: classify_subtype(&name),
                        title: Some(name),
                        is_default: false,
                        source: SubtitleSource::Standalone { path },
                    });
                }
            }
        }

        for text in &probe.text {
            if SubtitleFormat::from_codec_name(&text.format).is_none() {
                // Bitmap formats (PGS, VobSub) carry no text to process.
                debug!(
                    "skipping non-text subtitle stream {} ({})",
                    text.stream_index, text.format
                );
                continue;
            }
            let label = text.title.clone().unwrap_or_default();
            candidates.push(SubtitleCandidate {
                language: text.language.clone(),
                subtype: classify_subtype(&label),
                title: text.title.clone(),
                is_default: text.is_default,
                source: SubtitleSource::Embedded {
                    container: media_path.to_path_buf(),
                    stream_index: text.stream_index,
                    format: text.format.clone(),
                    codec_id: text.codec_id.clone(),
                },
            });
        }

        Self { candidates }
    }

    /// The discovered candidates, standalone first.
    pub fn candidates(&self) -> &[SubtitleCandidate] {
        &self.candidates
    }

    /// Produce a readable file for the candidate.
    ///
    /// Standalone candidates are used in place. Embedded candidates are
    /// demuxed to `track_<streamIndex><ext>` under the media artifact
    /// directory; materialization is idempotent, so an existing extraction
    /// from a prior run is reused.
    pub async fn materialize(
        paths: &PathService,
        ffmpeg: &Ffmpeg,
        candidate: &SubtitleCandidate,
    ) -> Result<PathBuf> {
        match &candidate.source {
            SubtitleSource::Standalone { path } => Ok(path.clone()),
            SubtitleSource::Embedded {
                container,
                stream_index,
                format,
                ..
            } => {
                let ext = SubtitleFormat::from_codec_name(format)
                    .map(|f| f.extension())
                    .unwrap_or(".srt");
                let target = paths.track_path(*stream_index, ext);
                if target.exists() {
                    debug!("reusing materialized track {}", target.display());
                    return Ok(target);
                }
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                ffmpeg
                    .extract_subtitle_track(container, *stream_index, &target)
                    .await?;
                Ok(target)
            }
        }
    }
}

fn is_sibling_subtitle(path: &Path, stem: &str) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !SUBTITLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if is_generated_artifact(name) {
        warn!("ignoring generated subtitle {}", name);
        return false;
    }
    name.starts_with(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mediainfo::parse_report;

    #[test]
    fn test_classify_subtype() {
        assert_eq!(classify_subtype("Dialogue"), SubtitleKind::Sub);
        assert_eq!(classify_subtype("English [CC]"), SubtitleKind::Cc);
        assert_eq!(classify_subtype("Closed Captions"), SubtitleKind::Cc);
        assert_eq!(classify_subtype("SDH stripped"), SubtitleKind::StrippedSdh);
        assert_eq!(classify_subtype("Dubtitles"), SubtitleKind::Dub);
        assert_eq!(classify_subtype(""), SubtitleKind::Sub);
    }

    #[test]
    fn test_subtype_ordering() {
        assert!(SubtitleKind::Cc > SubtitleKind::Dub);
        assert!(SubtitleKind::Dub > SubtitleKind::StrippedSdh);
        assert!(SubtitleKind::StrippedSdh > SubtitleKind::Sub);
    }

    #[test]
    fn test_build_indexes_siblings_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("Show E01.mkv");
        std::fs::write(&media, b"").unwrap();
        std::fs::write(dir.path().join("Show E01.ja.srt"), b"").unwrap();
        std::fs::write(dir.path().join("Show E01.en.ass"), b"").unwrap();
        // Rejected: other stem, generated markers, non-subtitle extension.
        std::fs::write(dir.path().join("Other.ja.srt"), b"").unwrap();
        std::fs::write(dir.path().join("Show E01_tokenized.srt"), b"").unwrap();
        std::fs::write(dir.path().join("Show E01.whisper-1.srt"), b"").unwrap();
        std::fs::write(dir.path().join("Show E01.txt"), b"").unwrap();

        let probe = parse_report(
            r#"{"media":{"track":[
                {"@type":"Text","StreamOrder":"3","Format":"ASS","Language":"ja","Default":"Yes"},
                {"@type":"Text","StreamOrder":"4","Format":"PGS","Language":"en"}
            ]}}"#,
        )
        .unwrap();

        let paths = PathService::new(&media);
        let index = SubtitleSourceIndex::build(&paths, &probe, &LanguageResolver::new());
        let candidates = index.candidates();

        // Two siblings plus the ASS stream; PGS is skipped.
        assert_eq!(candidates.len(), 3);
        assert!(matches!(
            candidates[0].source,
            SubtitleSource::Standalone { .. }
        ));
        let embedded = candidates
            .iter()
            .find(|c| matches!(c.source, SubtitleSource::Embedded { .. }))
            .unwrap();
        assert_eq!(embedded.language.base, "jpn");
        assert!(embedded.is_default);
    }

    #[tokio::test]
    async fn test_materialize_standalone_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("Show.mkv");
        let sub = dir.path().join("Show.ja.srt");
        std::fs::write(&sub, b"").unwrap();

        let candidate = SubtitleCandidate {
            language: LangTag::new("jpn", None),
            source: SubtitleSource::Standalone { path: sub.clone() },
            is_default: false,
            title: None,
            subtype: SubtitleKind::Sub,
        };
        let paths = PathService::new(&media);
        let ffmpeg = Ffmpeg::new("ffmpeg", true);
        let out = SubtitleSourceIndex::materialize(&paths, &ffmpeg, &candidate)
            .await
            .unwrap();
        assert_eq!(out, sub);
    }

    #[tokio::test]
    async fn test_materialize_embedded_reuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("Show.mkv");
        let paths = PathService::new(&media);
        let track = paths.track_path(3, ".ass");
        std::fs::create_dir_all(track.parent().unwrap()).unwrap();
        std::fs::write(&track, b"existing").unwrap();

        let candidate = SubtitleCandidate {
            language: LangTag::new("jpn", None),
            source: SubtitleSource::Embedded {
                container: media.clone(),
                stream_index: 3,
                format: "ASS".into(),
                codec_id: Some("S_TEXT/ASS".into()),
            },
            is_default: true,
            title: None,
            subtype: SubtitleKind::Sub,
        };
        // Dry-run ffmpeg would produce nothing, so getting the existing path
        // back proves the reuse branch ran.
        let ffmpeg = Ffmpeg::new("ffmpeg", true);
        let out = SubtitleSourceIndex::materialize(&paths, &ffmpeg, &candidate)
            .await
            .unwrap();
        assert_eq!(out, track);
        assert_eq!(std::fs::read(&track).unwrap(), b"existing");
    }
}
