//! Output path derivation for per-cue artifacts and the task ledger.
//!
//! Every artifact the pipeline emits is keyed by the source media file and a
//! cue timecode: clips and stills live under `<stem>.media/`, the ledger is
//! `<stem>.tsv` next to the media file, and the merged container is
//! `<stem>.<lang>.MERGED.<ext>`. Names pass through [`sanitize`] so they are
//! safe for both the filesystem and ffmpeg argv.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix of the per-media artifact directory. Directory-mode discovery
/// skips any directory whose name ends with this.
pub const MEDIA_DIR_SUFFIX: &str = ".media";

/// Markers identifying files generated by a previous run. Discovery rejects
/// any filename containing one of these so reruns never re-ingest output.
/// Transcription outputs carry the model name between stem and extension
/// (`<stem>.<model>.srt`), so the model-family markers cover them.
pub const GENERATED_MARKERS: &[&str] = &[
    ".MERGED",
    ".VOCALS.",
    ".VOICES.ENHANCED",
    ".CONDENSED",
    "_tokenized",
    "_romanized",
    "_selective",
    ".whisper",
    ".WHISPER",
];

/// Derives every output location for one media file.
///
/// # Examples
///
/// ```rust
/// use lingo_cli::core::paths::PathService;
/// use std::path::Path;
///
/// let paths = PathService::new(Path::new("/tmp/Show E01.mkv"));
/// assert!(paths.media_dir().ends_with("Show E01.media"));
/// assert!(paths.ledger_path().ends_with("Show E01.tsv"));
/// ```
#[derive(Debug, Clone)]
pub struct PathService {
    media_path: PathBuf,
    stem: String,
}

impl PathService {
    /// Create a path service rooted at the given media file.
    pub fn new(media_path: &Path) -> Self {
        let stem = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        Self {
            media_path: media_path.to_path_buf(),
            stem,
        }
    }

    /// The media file this service derives paths for.
    pub fn media_path(&self) -> &Path {
        &self.media_path
    }

    /// Sanitized media stem, used as the `source` field of every record.
    pub fn output_base(&self) -> String {
        sanitize(&self.stem)
    }

    /// Directory holding per-cue clips and stills: `<stem>.media/`.
    pub fn media_dir(&self) -> PathBuf {
        self.sibling(&format!("{}{}", self.stem, MEDIA_DIR_SUFFIX))
    }

    /// Append-only output ledger: `<stem>.tsv`.
    pub fn ledger_path(&self) -> PathBuf {
        self.sibling(&format!("{}.tsv", self.stem))
    }

    /// Prefix (without timecode or extension) for per-cue artifacts.
    pub fn artifact_prefix(&self) -> PathBuf {
        self.media_dir().join(sanitize(&self.stem))
    }

    /// Merged multi-track container: `<stem>.<lang>.MERGED.<ext>`.
    pub fn merged_path(&self, lang_code: &str, ext: &str) -> PathBuf {
        self.sibling(&format!("{}.{}.MERGED.{}", self.stem, lang_code, ext))
    }

    /// Transliterated subtitle sibling: `<stem>_<style suffix>.srt`.
    pub fn translit_path(&self, suffix: &str) -> PathBuf {
        self.sibling(&format!("{}{}.srt", self.stem, suffix))
    }

    /// Materialization target for an embedded subtitle stream.
    pub fn track_path(&self, stream_index: usize, ext: &str) -> PathBuf {
        self.media_dir().join(format!("track_{}{}", stream_index, ext))
    }

    fn sibling(&self, name: &str) -> PathBuf {
        self.media_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(name)
    }
}

/// Replace characters that break filesystems or ffmpeg argument parsing.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' | '%' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Format a cue start as the filename-safe timecode `HHhMMmSSsmmm`.
///
/// This string is both the resumption-oracle key and the per-cue artifact
/// name component, so it must be stable across runs.
pub fn timecode(at: Duration) -> String {
    let total_ms = at.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let milliseconds = total_ms % 1_000;
    format!(
        "{:02}h{:02}m{:02}s{:03}",
        hours, minutes, seconds, milliseconds
    )
}

/// True when the filename carries a generated-artifact marker.
pub fn is_generated_artifact(name: &str) -> bool {
    GENERATED_MARKERS.iter().any(|m| name.contains(m))
        || name.contains(&format!("{}{}", MEDIA_DIR_SUFFIX, std::path::MAIN_SEPARATOR))
}
