//! Output merging: plan and drive the mux of generated artifacts into one
//! multi-track container.
//!
//! The plan collects the base video, any generated audio siblings (enhanced
//! voices, condensed track), and the selected/generated subtitle files, then
//! renders an ffmpeg argv that stream-copies everything with language and
//! title metadata. A failing mux aborts the task.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::Result;
use crate::core::language::LangTag;
use crate::core::paths::PathService;
use crate::services::ffmpeg::Ffmpeg;

/// One audio track to merge.
#[derive(Debug, Clone)]
pub struct MergeAudio {
    /// Audio file path.
    pub path: PathBuf,
    /// Track language.
    pub language: LangTag,
    /// Track title.
    pub title: String,
    /// Whether this track gets the default disposition.
    pub is_default: bool,
}

/// One subtitle track to merge.
#[derive(Debug, Clone)]
pub struct MergeSubtitle {
    /// Subtitle file path.
    pub path: PathBuf,
    /// Track language.
    pub language: LangTag,
    /// Track title.
    pub title: String,
}

/// The full muxing plan for one task.
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// Base container contributing the video stream.
    pub video: PathBuf,
    /// Extra audio tracks, in output order.
    pub audio: Vec<MergeAudio>,
    /// Extra subtitle tracks, in output order.
    pub subtitles: Vec<MergeSubtitle>,
    /// Merged output path.
    pub output: PathBuf,
}

impl MergePlan {
    /// Start a plan around the base video; the output lands next to it as
    /// `<stem>.<lang>.MERGED.<ext>`.
    pub fn new(paths: &PathService, target: &LangTag, container_ext: &str) -> Self {
        Self {
            video: paths.media_path().to_path_buf(),
            audio: Vec::new(),
            subtitles: Vec::new(),
            output: paths.merged_path(&target.base, container_ext),
        }
    }

    /// Add generated audio siblings that exist on disk: enhanced-voices and
    /// condensed tracks from this or earlier runs.
    pub fn discover_generated_audio(&mut self, target: &LangTag) {
        let stem = self
            .video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = self
            .video
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let enhanced = parent.join(format!("{}.VOICES.ENHANCED.ogg", stem));
        if enhanced.exists() {
            self.audio.push(MergeAudio {
                path: enhanced,
                language: target.clone(),
                title: "Enhanced voices".into(),
                is_default: true,
            });
        }
        let condensed = parent.join(format!("{}.CONDENSED.ogg", stem));
        if condensed.exists() {
            self.audio.push(MergeAudio {
                path: condensed,
                language: target.clone(),
                title: "Condensed audio".into(),
                is_default: false,
            });
        }
    }

    /// Add a subtitle file to the plan.
    pub fn add_subtitle(&mut self, path: PathBuf, language: LangTag, title: impl Into<String>) {
        self.subtitles.push(MergeSubtitle {
            path,
            language,
            title: title.into(),
        });
    }

    /// Render the ffmpeg argv for this plan (inputs, maps, stream copies,
    /// per-stream metadata, disposition flags, output).
    pub fn build_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        args.extend([os("-i"), self.video.clone().into()]);
        for track in &self.audio {
            args.extend([os("-i"), track.path.clone().into()]);
        }
        for track in &self.subtitles {
            args.extend([os("-i"), track.path.clone().into()]);
        }

        // Everything from the base container first, then each extra input.
        args.extend([os("-map"), os("0")]);
        for i in 0..self.audio.len() {
            args.extend([os("-map"), os(&format!("{}:a", i + 1))]);
        }
        let sub_base = 1 + self.audio.len();
        for i in 0..self.subtitles.len() {
            args.extend([os("-map"), os(&format!("{}:s", sub_base + i))]);
        }
        args.extend([os("-c"), os("copy")]);

        // Merged audio tracks are appended after the base container's own.
        // Their output indices are unknown without probing the base, so
        // metadata is addressed from the end of the stream list backwards.
        for (i, track) in self.audio.iter().enumerate() {
            args.extend([
                os(&format!("-metadata:s:a:{}", i)),
                os(&format!("language={}", track.language.base)),
                os(&format!("-metadata:s:a:{}", i)),
                os(&format!("title={}", track.title)),
            ]);
            if track.is_default {
                args.extend([os(&format!("-disposition:a:{}", i)), os("default")]);
            }
        }
        for (i, track) in self.subtitles.iter().enumerate() {
            args.extend([
                os(&format!("-metadata:s:s:{}", i)),
                os(&format!("language={}", track.language.base)),
                os(&format!("-metadata:s:s:{}", i)),
                os(&format!("title={}", track.title)),
            ]);
        }

        args.push(self.output.clone().into());
        args
    }
}

/// Drives the external muxer over a [`MergePlan`].
#[derive(Debug, Clone)]
pub struct OutputMerger {
    ffmpeg: Ffmpeg,
}

impl OutputMerger {
    /// Merger over the given ffmpeg wrapper.
    pub fn new(ffmpeg: Ffmpeg) -> Self {
        Self { ffmpeg }
    }

    /// Execute the plan. The merged file is skipped when already present
    /// (a prior run finished it); a non-zero muxer exit surfaces as a
    /// task-aborting error.
    pub async fn merge(&self, plan: &MergePlan) -> Result<PathBuf> {
        if plan.output.exists() {
            info!("merged output {} already exists", plan.output.display());
            return Ok(plan.output.clone());
        }
        if plan.audio.is_empty() && plan.subtitles.is_empty() {
            debug!("nothing to merge beyond the base container; skipping mux");
            return Ok(plan.video.clone());
        }
        self.ffmpeg.mux(&plan.build_args()).await?;
        info!("merged {}", plan.output.display());
        Ok(plan.output.clone())
    }
}

fn os(s: &str) -> OsString {
    OsString::from(s)
}
