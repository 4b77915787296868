// src/cli/generate_completion_args.rs
use clap::Args;
use clap_complete::Shell;

/// Arguments for the `generate-completion` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GenerateCompletionArgs {
    /// Shell to generate a completion script for
    #[arg(value_enum)]
    pub shell: Shell,
}
