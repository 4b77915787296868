//! ffmpeg invocation: per-cue clip and still extraction, embedded subtitle
//! demuxing, stream concatenation, and muxing.
//!
//! Every operation shells out to the ffmpeg binary process-per-call, so
//! concurrent invocations from the worker pool need no locking. Extraction
//! targets are checked before the spawn: a pre-existing output surfaces as
//! [`LingoError::FileAlreadyExists`], which the item processor treats as
//! "already done" rather than a failure.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;

use crate::Result;
use crate::core::paths::timecode;
use crate::error::LingoError;

/// Output format for per-cue audio clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    /// Vorbis in Ogg, the default per-cue clip format.
    Ogg,
    /// PCM WAV, used when the condensed-audio path is active.
    Wav,
}

impl ClipFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::Ogg => "ogg",
            ClipFormat::Wav => "wav",
        }
    }

    fn codec(&self) -> &'static str {
        match self {
            ClipFormat::Ogg => "libvorbis",
            ClipFormat::Wav => "pcm_s16le",
        }
    }
}

/// Everything needed to cut one audio clip out of the source container.
#[derive(Debug, Clone)]
pub struct AudioClipSpec {
    /// Output clip format.
    pub format: ClipFormat,
    /// Absolute stream index inside the container.
    pub stream_index: usize,
    /// Signed shift applied to both edges, in milliseconds.
    pub offset_ms: i64,
    /// Cue start.
    pub start: Duration,
    /// Cue end.
    pub end: Duration,
}

/// Thin wrapper over the ffmpeg binary.
///
/// With `dry_run` set, commands are logged instead of spawned and outputs are
/// reported as produced; the pipeline stays exercisable without ffmpeg
/// installed.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: String,
    dry_run: bool,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg", false)
    }
}

impl Ffmpeg {
    /// Create a wrapper for the given binary name or path.
    pub fn new(binary: impl Into<String>, dry_run: bool) -> Self {
        Self {
            binary: binary.into(),
            dry_run,
        }
    }

    /// Cut one audio clip; the output is `<prefix>_<timecode>.<ext>`.
    ///
    /// Returns [`LingoError::FileAlreadyExists`] when the target is already
    /// on disk, without touching it.
    pub async fn extract_audio_clip(
        &self,
        source: &Path,
        output_prefix: &Path,
        spec: &AudioClipSpec,
    ) -> Result<PathBuf> {
        let out = artifact_path(output_prefix, spec.start, spec.format.extension());
        if out.exists() {
            return Err(LingoError::FileAlreadyExists(out.display().to_string()));
        }

        let start = shift(spec.start, spec.offset_ms);
        let end = shift(spec.end, spec.offset_ms);
        let mut args = base_args();
        args.extend([
            os("-ss"),
            os(&fmt_secs(start)),
            os("-to"),
            os(&fmt_secs(end)),
            os("-i"),
            source.into(),
            os("-map"),
            os(&format!("0:{}", spec.stream_index)),
            os("-vn"),
            os("-c:a"),
            os(spec.format.codec()),
            out.clone().into(),
        ]);
        self.run(&args).await?;
        Ok(out)
    }

    /// Extract one still image spanning the cue; the output is
    /// `<prefix>_<timecode>.avif`. The still's existence is the per-cue
    /// completion marker, so the AlreadyExists check runs first.
    pub async fn extract_still(
        &self,
        source: &Path,
        output_prefix: &Path,
        start: Duration,
        end: Duration,
    ) -> Result<PathBuf> {
        let out = artifact_path(output_prefix, start, "avif");
        if out.exists() {
            return Err(LingoError::FileAlreadyExists(out.display().to_string()));
        }

        let midpoint = start + (end.saturating_sub(start)) / 2;
        let mut args = base_args();
        args.extend([
            os("-ss"),
            os(&fmt_secs(midpoint)),
            os("-i"),
            source.into(),
            os("-frames:v"),
            os("1"),
            os("-c:v"),
            os("libaom-av1"),
            os("-still-picture"),
            os("1"),
            out.clone().into(),
        ]);
        self.run(&args).await?;
        Ok(out)
    }

    /// Demux one embedded text stream to `output`. Callers handle
    /// idempotence by checking the target before asking.
    pub async fn extract_subtitle_track(
        &self,
        container: &Path,
        stream_index: usize,
        output: &Path,
    ) -> Result<()> {
        let mut args = base_args();
        args.extend([
            os("-i"),
            container.into(),
            os("-map"),
            os(&format!("0:{}", stream_index)),
            output.into(),
        ]);
        self.run(&args).await
    }

    /// Concatenate clips listed in an ffmpeg concat file into one track.
    pub async fn concat_audio(&self, list_file: &Path, output: &Path) -> Result<()> {
        let mut args = base_args();
        args.extend([
            os("-f"),
            os("concat"),
            os("-safe"),
            os("0"),
            os("-i"),
            list_file.into(),
            os("-c:a"),
            os("libvorbis"),
            output.into(),
        ]);
        self.run(&args).await
    }

    /// Run a fully assembled muxing argv (see `core::merge`). A non-zero
    /// exit aborts the task.
    pub async fn mux(&self, args: &[OsString]) -> Result<()> {
        let mut full = base_args();
        full.extend(args.iter().cloned());
        self.run(&full).await
    }

    async fn run(&self, args: &[OsString]) -> Result<()> {
        debug!("{} {}", self.binary, render_args(args));
        if self.dry_run {
            return Ok(());
        }

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| LingoError::command_failed(&self.binary, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            warn!("{} exited with {}: {}", self.binary, output.status, tail);
            return Err(LingoError::command_failed(
                &self.binary,
                format!("{}: {}", output.status, tail),
            ));
        }
        Ok(())
    }
}

/// Per-cue artifact path: `<prefix>_<timecode>.<ext>`.
pub fn artifact_path(prefix: &Path, start: Duration, ext: &str) -> PathBuf {
    let mut name = prefix
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('_');
    name.push_str(&timecode(start));
    name.push('.');
    name.push_str(ext);
    prefix.with_file_name(name)
}

fn base_args() -> Vec<OsString> {
    vec![os("-nostdin"), os("-loglevel"), os("error"), os("-y")]
}

fn os(s: &str) -> OsString {
    OsString::from(s)
}

fn shift(at: Duration, offset_ms: i64) -> Duration {
    if offset_ms >= 0 {
        at + Duration::from_millis(offset_ms as u64)
    } else {
        at.saturating_sub(Duration::from_millis(offset_ms.unsigned_abs()))
    }
}

fn fmt_secs(at: Duration) -> String {
    format!("{}.{:03}", at.as_secs(), at.subsec_millis())
}

fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_shape() {
        let p = artifact_path(
            Path::new("/out/Show.media/Show"),
            Duration::from_millis(62_500),
            "ogg",
        );
        assert_eq!(p, PathBuf::from("/out/Show.media/Show_00h01m02s500.ogg"));
    }

    #[test]
    fn test_shift_clamps_at_zero() {
        assert_eq!(shift(Duration::from_millis(500), -1000), Duration::ZERO);
        assert_eq!(
            shift(Duration::from_millis(500), 250),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn test_fmt_secs() {
        assert_eq!(fmt_secs(Duration::from_millis(62_500)), "62.500");
        assert_eq!(fmt_secs(Duration::ZERO), "0.000");
    }

    #[tokio::test]
    async fn test_existing_clip_reports_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("Show");
        let spec = AudioClipSpec {
            format: ClipFormat::Ogg,
            stream_index: 1,
            offset_ms: 0,
            start: Duration::from_secs(1),
            end: Duration::from_secs(2),
        };
        let existing = artifact_path(&prefix, spec.start, "ogg");
        std::fs::write(&existing, b"stub").unwrap();

        let ff = Ffmpeg::new("ffmpeg", true);
        let err = ff
            .extract_audio_clip(Path::new("in.mkv"), &prefix, &spec)
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_dry_run_skips_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("Show");
        let ff = Ffmpeg::new("definitely-not-a-binary", true);
        let out = ff
            .extract_still(
                Path::new("in.mkv"),
                &prefix,
                Duration::from_secs(1),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert!(out.to_string_lossy().ends_with("Show_00h00m01s000.avif"));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_failure() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("Show");
        let ff = Ffmpeg::new("definitely-not-a-binary", false);
        let err = ff
            .extract_still(
                Path::new("in.mkv"),
                &prefix,
                Duration::from_secs(1),
                Duration::from_secs(2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LingoError::CommandFailed { .. }));
    }
}
