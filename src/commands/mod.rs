//! Command execution module.
//!
//! Each CLI subcommand's business logic lives here: `process_command` is the
//! routing driver over single-file and bulk-directory inputs, and
//! `probe_command` inspects containers and previews track selection.

pub mod probe_command;
pub mod process_command;
