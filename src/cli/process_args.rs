// src/cli/process_args.rs
use clap::Args;
use std::path::PathBuf;

/// Arguments for the `process` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Media file, or a directory for bulk mode
    pub input: PathBuf,

    /// Target languages, most preferred first (e.g. "ja" or "zh-Hans,zh")
    #[arg(short = 'l', long = "langs")]
    pub langs: Option<String>,

    /// Native reference languages, most preferred first
    #[arg(long = "native-langs")]
    pub native_langs: Option<String>,

    /// Worker count override
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Audio offset in milliseconds applied to clip boundaries
    #[arg(long)]
    pub offset_ms: Option<i64>,

    /// Replace subtitle text with speech-to-text transcripts
    #[arg(long)]
    pub stt: bool,

    /// Produce transliterated subtitle siblings
    #[arg(long)]
    pub translit: bool,

    /// Skip the final merged container
    #[arg(long)]
    pub no_merge: bool,

    /// Log external commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Assume "continue" on prompts (useful for unattended bulk runs)
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,
}

/// How the driver expands the input path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// One media file.
    Single,
    /// Walk a directory tree.
    Bulk,
}

impl ProcessArgs {
    /// Single-file or bulk mode, from the input path shape.
    pub fn input_mode(&self) -> InputMode {
        if self.input.is_dir() {
            InputMode::Bulk
        } else {
            InputMode::Single
        }
    }
}
