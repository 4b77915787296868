// src/cli/probe_args.rs
use clap::Args;
use std::path::PathBuf;

/// Arguments for the `probe` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Media file to inspect
    pub input: PathBuf,

    /// Target languages to preview the selection for
    #[arg(short = 'l', long = "langs")]
    pub langs: Option<String>,
}
