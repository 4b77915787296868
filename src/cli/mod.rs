//! Command-line interface for the lingo media pipeline.
//!
//! The CLI is built with `clap` and follows a subcommand pattern:
//! - `process` - turn a media file (or directory) into learning artifacts
//! - `probe` - inspect a container's tracks and preview track selection
//! - `generate-completion` - shell completion script generation
//!
//! # Examples
//!
//! ```bash
//! # Process one file for Japanese with English reference subtitles
//! lingo-cli process "Show E01.mkv" --langs ja --native-langs en
//!
//! # Bulk mode over a directory, resuming wherever ledgers exist
//! lingo-cli process ./season1 --langs zh-Hans,zh --workers 8
//!
//! # See which tracks selection would pick
//! lingo-cli probe "Show E01.mkv" --langs ja
//! ```

mod generate_completion_args;
mod probe_args;
mod process_args;
pub mod ui;

pub use generate_completion_args::GenerateCompletionArgs;
pub use probe_args::ProbeArgs;
pub use process_args::{InputMode, ProcessArgs};
pub use ui::{RunReporter, status_err, status_ok, status_warn};

use clap::{CommandFactory, Parser, Subcommand};

use crate::config::ConfigService;

/// Main CLI application structure defining the top-level interface.
#[derive(Parser, Debug)]
#[command(name = "lingo-cli")]
#[command(about = "Turn video and subtitles into language-learning artifacts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process media into per-cue clips, stills, transcripts and a ledger
    Process(ProcessArgs),

    /// Inspect a container's tracks and preview track selection
    Probe(ProbeArgs),

    /// Generate shell completion scripts
    GenerateCompletion(GenerateCompletionArgs),
}

/// Execute the CLI with the production configuration service.
///
/// # Examples
///
/// ```rust
/// use lingo_cli::cli::run;
///
/// # tokio_test::block_on(async {
/// // This would typically be called from main()
/// // run().await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub async fn run() -> crate::Result<()> {
    let config_service = crate::config::ProductionConfigService::new()?;
    run_with_config(&config_service).await
}

/// Execute the CLI with an injected configuration service.
pub async fn run_with_config(config_service: &dyn ConfigService) -> crate::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Process(args) => {
            crate::commands::process_command::execute(args, config_service).await
        }
        Commands::Probe(args) => {
            crate::commands::probe_command::execute(args, config_service).await
        }
        Commands::GenerateCompletion(args) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(args.shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_process() {
        let cli = Cli::parse_from([
            "lingo-cli",
            "process",
            "show.mkv",
            "--langs",
            "ja",
            "--workers",
            "4",
            "--stt",
        ]);
        match cli.command {
            Commands::Process(args) => {
                assert_eq!(args.input.to_str(), Some("show.mkv"));
                assert_eq!(args.langs.as_deref(), Some("ja"));
                assert_eq!(args.workers, Some(4));
                assert!(args.stt);
                assert!(!args.dry_run);
            }
            _ => panic!("expected process subcommand"),
        }
    }

    #[test]
    fn test_cli_parses_probe() {
        let cli = Cli::parse_from(["lingo-cli", "probe", "show.mkv"]);
        assert!(matches!(cli.command, Commands::Probe(_)));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["lingo-cli"]).is_err());
    }
}
