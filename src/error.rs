//! Error types for the lingo-cli media pipeline.
//!
//! This module defines the `LingoError` enum covering all error conditions
//! that can occur during media probing, artifact extraction, speech-to-text
//! transcription, transliteration, and pipeline execution, together with the
//! `ErrorBehavior` taxonomy that drives how the routing layer reacts to a
//! failed task.
use thiserror::Error;

/// How the routing layer should react to an error.
///
/// Every error carries one of these behaviors; the bulk driver inspects it
/// after each task to decide whether to continue with the next file, abort
/// the current task, or abort the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorBehavior {
    /// Log and keep processing the current task.
    Continue,
    /// Abort the current task; in bulk mode the driver advances to the next.
    AbortTask,
    /// Abort the entire run.
    AbortAllTasks,
    /// Ask the user how to proceed; non-interactive callers treat this as
    /// [`ErrorBehavior::AbortTask`].
    ProbeUser,
}

impl std::fmt::Display for ErrorBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorBehavior::Continue => "continue",
            ErrorBehavior::AbortTask => "abort-task",
            ErrorBehavior::AbortAllTasks => "abort-all",
            ErrorBehavior::ProbeUser => "probe-user",
        };
        f.write_str(s)
    }
}

/// Represents all possible errors in the lingo pipeline.
///
/// Each variant provides specific context to facilitate debugging and
/// user-friendly reporting, and maps to an [`ErrorBehavior`] via
/// [`LingoError::behavior`] and to an exit code via [`LingoError::exit_code`].
#[derive(Error, Debug)]
pub enum LingoError {
    /// I/O operation failed during file system access.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error due to invalid or missing settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Subtitle parsing error indicating invalid timestamps or structure.
    #[error("Subtitle format error [{format}]: {message}")]
    SubtitleFormat {
        /// The subtitle format that caused the error (e.g., "SRT", "ASS")
        format: String,
        /// Detailed error message describing the issue
        message: String,
    },

    /// A BCP-47 language tag could not be parsed.
    #[error("Language tag error: {message}")]
    LanguageTag {
        /// Description of the tag problem, including suggested corrections
        message: String,
    },

    /// Media container probe failed or produced unusable output.
    #[error("Media probe error: {message}")]
    MediaProbe {
        /// Description of the probe failure
        message: String,
    },

    /// No subtitle or audio track satisfied the requested languages.
    #[error("Track selection error: {message}")]
    NoMatchingTrack {
        /// Description of what was requested and what was available
        message: String,
    },

    /// An external command (ffmpeg, mediainfo) exited with a failure.
    #[error("Command '{program}' failed: {message}")]
    CommandFailed {
        /// Program that was invoked
        program: String,
        /// Captured failure detail (exit status and stderr tail)
        message: String,
    },

    /// Indicates that an extraction target already exists on disk.
    #[error("File already exists: {0}")]
    FileAlreadyExists(String),
    /// Indicates that the specified file was not found.
    #[error("File not found: {0}")]
    FileNotFound(String),
    /// The provided path is invalid or malformed.
    #[error("Invalid path: {0}")]
    InvalidPath(std::path::PathBuf),
    /// Unable to read the specified directory.
    #[error("Unable to read directory: {path}")]
    DirectoryReadError {
        /// The directory path that could not be read
        path: std::path::PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Speech-to-text service error.
    #[error("STT error: {message}")]
    Stt {
        /// Raw error detail from the transcription service
        message: String,
    },

    /// Speech-to-text request exceeded its configured deadline.
    #[error("STT request timed out after {seconds}s")]
    SttTimeout {
        /// Configured timeout that was exceeded
        seconds: u64,
    },

    /// The operation was cancelled by the user or a failing peer.
    #[error("Operation cancelled")]
    Cancelled,

    /// Transliteration provider pool is at capacity for the requested key.
    #[error("Provider pool at capacity for {key}")]
    PoolAtCapacity {
        /// The pool key (language and style) that was full
        key: String,
    },

    /// Transliteration provider failed to initialize.
    #[error("Provider init failed [{provider}]: {message}")]
    ProviderInit {
        /// Provider name
        provider: String,
        /// Initialization failure detail
        message: String,
    },

    /// Transliteration provider failed while processing text.
    #[error("Provider error [{provider}]: {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Failure detail
        message: String,
    },

    /// Catch-all error variant wrapping any other failure.
    #[error("Unknown error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Specialized `Result` type for lingo operations.
pub type LingoResult<T> = Result<T, LingoError>;

impl LingoError {
    /// Create a configuration error with the given message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        LingoError::Config {
            message: message.into(),
        }
    }

    /// Create a subtitle format error for the given format and message.
    pub fn subtitle_format<S1, S2>(format: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        LingoError::SubtitleFormat {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create a language tag error with the given message.
    pub fn language_tag<S: Into<String>>(message: S) -> Self {
        LingoError::LanguageTag {
            message: message.into(),
        }
    }

    /// Create a media probe error with the given message.
    pub fn media_probe<S: Into<String>>(message: S) -> Self {
        LingoError::MediaProbe {
            message: message.into(),
        }
    }

    /// Create a track selection error with the given message.
    pub fn no_matching_track<S: Into<String>>(message: S) -> Self {
        LingoError::NoMatchingTrack {
            message: message.into(),
        }
    }

    /// Create an external command failure for the given program.
    pub fn command_failed<S1, S2>(program: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        LingoError::CommandFailed {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create an STT service error with the given message.
    pub fn stt<S: Into<String>>(message: S) -> Self {
        LingoError::Stt {
            message: message.into(),
        }
    }

    /// Create a provider processing error.
    pub fn provider<S1, S2>(provider: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        LingoError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True when the error signals that an output artifact already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, LingoError::FileAlreadyExists(_))
    }

    /// The routing behavior this error carries.
    pub fn behavior(&self) -> ErrorBehavior {
        match self {
            LingoError::Cancelled => ErrorBehavior::AbortAllTasks,
            LingoError::Config { .. } => ErrorBehavior::AbortAllTasks,
            LingoError::SttTimeout { .. } => ErrorBehavior::AbortTask,
            LingoError::Stt { .. } => ErrorBehavior::AbortTask,
            LingoError::SubtitleFormat { .. } => ErrorBehavior::AbortTask,
            LingoError::LanguageTag { .. } => ErrorBehavior::AbortTask,
            LingoError::MediaProbe { .. } => ErrorBehavior::AbortTask,
            LingoError::NoMatchingTrack { .. } => ErrorBehavior::ProbeUser,
            LingoError::CommandFailed { .. } => ErrorBehavior::AbortTask,
            LingoError::FileAlreadyExists(_) => ErrorBehavior::Continue,
            LingoError::FileNotFound(_) => ErrorBehavior::AbortTask,
            LingoError::InvalidPath(_) => ErrorBehavior::AbortTask,
            LingoError::DirectoryReadError { .. } => ErrorBehavior::AbortTask,
            LingoError::PoolAtCapacity { .. } => ErrorBehavior::Continue,
            LingoError::ProviderInit { .. } => ErrorBehavior::AbortTask,
            LingoError::Provider { .. } => ErrorBehavior::Continue,
            LingoError::Io(_) => ErrorBehavior::AbortTask,
            LingoError::Other(_) => ErrorBehavior::AbortTask,
        }
    }

    /// Return the corresponding exit code for this error variant.
    pub fn exit_code(&self) -> i32 {
        match self {
            LingoError::Io(_) => 1,
            LingoError::Config { .. } => 2,
            LingoError::Stt { .. } | LingoError::SttTimeout { .. } => 3,
            LingoError::SubtitleFormat { .. } => 4,
            LingoError::LanguageTag { .. } => 5,
            LingoError::MediaProbe { .. } | LingoError::NoMatchingTrack { .. } => 6,
            LingoError::CommandFailed { .. } => 7,
            LingoError::PoolAtCapacity { .. }
            | LingoError::ProviderInit { .. }
            | LingoError::Provider { .. } => 8,
            LingoError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Return a user-friendly error message with suggested remedies.
    pub fn user_friendly_message(&self) -> String {
        match self {
            LingoError::Io(e) => format!("File operation error: {}", e),
            LingoError::Config { message } => format!(
                "Configuration error: {}\nHint: run 'lingo-cli process --help' for options",
                message
            ),
            LingoError::SubtitleFormat { message, .. } => format!(
                "Subtitle processing error: {}\nHint: check file format and encoding",
                message
            ),
            LingoError::LanguageTag { message } => format!(
                "Language tag error: {}\nHint: use BCP-47 tags such as 'ja', 'zh-Hans' or 'pt-BR'",
                message
            ),
            LingoError::MediaProbe { message } => format!(
                "Media probe error: {}\nHint: ensure mediainfo is installed and the file is readable",
                message
            ),
            LingoError::NoMatchingTrack { message } => format!(
                "Track selection error: {}\nHint: run 'lingo-cli probe' to list available tracks",
                message
            ),
            LingoError::CommandFailed { program, message } => format!(
                "External command '{}' failed: {}\nHint: ensure it is installed and on PATH",
                program, message
            ),
            LingoError::Stt { message } => format!(
                "STT error: {}\nHint: check network connection and API key settings",
                message
            ),
            LingoError::SttTimeout { seconds } => format!(
                "STT request timed out after {}s\nHint: raise stt.timeout_seconds or pick a smaller model",
                seconds
            ),
            LingoError::Cancelled => "Operation cancelled".to_string(),
            LingoError::Other(err) => {
                format!("Unknown error: {}\nHint: please report this issue", err)
            }
            _ => format!("Error: {}", self),
        }
    }
}

// Convert reqwest errors from the STT and tokenizer clients
impl From<reqwest::Error> for LingoError {
    fn from(err: reqwest::Error) -> Self {
        LingoError::Stt {
            message: err.to_string(),
        }
    }
}

// Convert file exploration errors from the discovery walk
impl From<walkdir::Error> for LingoError {
    fn from(err: walkdir::Error) -> Self {
        LingoError::DirectoryReadError {
            path: err.path().map(|p| p.to_path_buf()).unwrap_or_default(),
            source: err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk error")),
        }
    }
}

// Convert config crate errors to configuration errors
impl From<config::ConfigError> for LingoError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(path) => LingoError::Config {
                message: format!("Configuration file not found: {}", path),
            },
            config::ConfigError::Message(msg) => LingoError::Config { message: msg },
            _ => LingoError::Config {
                message: format!("Configuration error: {}", err),
            },
        }
    }
}

impl From<serde_json::Error> for LingoError {
    fn from(err: serde_json::Error) -> Self {
        LingoError::MediaProbe {
            message: format!("JSON parse error: {}", err),
        }
    }
}

// Unit tests: LingoError behaviors and helper methods
#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_error_creation() {
        let error = LingoError::config("test config error");
        assert!(matches!(error, LingoError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: test config error");
    }

    #[test]
    fn test_subtitle_format_error_creation() {
        let error = LingoError::subtitle_format("SRT", "invalid timestamp");
        let msg = error.to_string();
        assert!(msg.contains("SRT"));
        assert!(msg.contains("invalid timestamp"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let lingo_error: LingoError = io_error.into();
        assert!(matches!(lingo_error, LingoError::Io(_)));
    }

    #[test]
    fn test_behavior_mapping() {
        assert_eq!(
            LingoError::Cancelled.behavior(),
            ErrorBehavior::AbortAllTasks
        );
        assert_eq!(
            LingoError::SttTimeout { seconds: 30 }.behavior(),
            ErrorBehavior::AbortTask
        );
        assert_eq!(
            LingoError::FileAlreadyExists("x.ogg".into()).behavior(),
            ErrorBehavior::Continue
        );
        assert_eq!(
            LingoError::no_matching_track("no jpn subtitle").behavior(),
            ErrorBehavior::ProbeUser
        );
        assert_eq!(
            LingoError::PoolAtCapacity {
                key: "jpn/tokenize".into()
            }
            .behavior(),
            ErrorBehavior::Continue
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(LingoError::config("x").exit_code(), 2);
        assert_eq!(LingoError::stt("x").exit_code(), 3);
        assert_eq!(LingoError::subtitle_format("SRT", "x").exit_code(), 4);
        assert_eq!(LingoError::language_tag("x").exit_code(), 5);
        assert_eq!(LingoError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(LingoError::FileAlreadyExists("a.avif".into()).is_already_exists());
        assert!(!LingoError::FileNotFound("a.avif".into()).is_already_exists());
    }

    #[test]
    fn test_user_friendly_messages() {
        let config_error = LingoError::config("missing key");
        let message = config_error.user_friendly_message();
        assert!(message.contains("Configuration error:"));
        assert!(message.contains("--help"));

        let stt_error = LingoError::stt("network failure");
        let message = stt_error.user_friendly_message();
        assert!(message.contains("STT error:"));
        assert!(message.contains("check network connection"));
    }

    #[test]
    fn test_behavior_display() {
        assert_eq!(ErrorBehavior::Continue.to_string(), "continue");
        assert_eq!(ErrorBehavior::AbortAllTasks.to_string(), "abort-all");
    }
}
