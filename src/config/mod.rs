//! Configuration management for lingo.
//!
//! All settings live in one [`Config`] aggregating per-concern sections,
//! loaded through a layered [`ConfigService`]: built-in defaults, then the
//! user's TOML file under the platform config directory, then `LINGO_*`
//! environment overrides. Production code receives the service by injection;
//! tests use [`TestConfigService`] with a fully controlled configuration.
//!
//! [`ConfigService`]: service::ConfigService
//! [`TestConfigService`]: service::TestConfigService

pub mod service;

pub use service::{ConfigService, ProductionConfigService, TestConfigService};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::LingoError;

/// Full application configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// General runtime options.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Pipeline concurrency and extraction options.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Language preferences.
    #[serde(default)]
    pub languages: LanguagesConfig,
    /// Speech-to-text settings.
    #[serde(default)]
    pub stt: SttConfig,
    /// Transliteration provider settings.
    #[serde(default)]
    pub translit: TranslitConfig,
    /// Output merging settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

/// General runtime options.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    /// Single-character ledger field separator.
    pub field_sep: String,
    /// Video extensions accepted by directory discovery.
    pub video_extensions: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            field_sep: "\t".to_string(),
            video_extensions: vec!["mp4".to_string(), "mkv".to_string()],
        }
    }
}

/// Pipeline concurrency and extraction options.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker count for cue processing.
    pub workers_max: usize,
    /// Signed audio offset applied to clip boundaries, in milliseconds.
    pub offset_ms: i64,
    /// Extract WAV clips and build a condensed listening track.
    pub condensed_audio: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers_max: num_cpus::get().max(1),
            offset_ms: 0,
            condensed_audio: false,
        }
    }
}

/// Language preferences, most preferred first.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LanguagesConfig {
    /// Target (learning) languages.
    pub targets: Vec<String>,
    /// Native (reference) languages.
    pub natives: Vec<String>,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            targets: vec!["ja".to_string()],
            natives: vec!["en".to_string()],
        }
    }
}

/// Speech-to-text settings for the Whisper-compatible client.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SttConfig {
    /// Whether STT replaces subtitle text with transcripts.
    pub enabled: bool,
    /// Model identifier.
    pub model: String,
    /// API key; the `LINGO_STT__API_KEY` environment variable overrides.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// Per-request deadline in seconds.
    pub timeout_seconds: u64,
    /// Retry attempts after the first failure.
    pub max_retries: u32,
    /// Delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Optional decoding prompt.
    pub initial_prompt: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "whisper-1".to_string(),
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 90,
            max_retries: 3,
            retry_delay_ms: 1000,
            initial_prompt: None,
        }
    }
}

/// Transliteration provider settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TranslitConfig {
    /// Whether transliterated subtitle siblings are produced.
    pub enabled: bool,
    /// Output styles to produce (`tokenize`, `romanize`, `selective`).
    pub styles: Vec<String>,
    /// Tokenizer service base URL.
    pub base_url: String,
    /// Request deadline in seconds.
    pub timeout_seconds: u64,
    /// Maximum provider instances per language/style key.
    pub max_per_key: usize,
    /// Initial pool vector capacity.
    pub initial_capacity: usize,
    /// Idle span in seconds after which a provider is reaped.
    pub idle_timeout_seconds: u64,
}

impl Default for TranslitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            styles: vec!["tokenize".to_string()],
            base_url: "http://localhost:8970".to_string(),
            timeout_seconds: 120,
            max_per_key: 2,
            initial_capacity: 2,
            idle_timeout_seconds: 600,
        }
    }
}

/// Output merging settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MergeConfig {
    /// Whether the merged container is produced after processing.
    pub enabled: bool,
    /// Container extension of the merged output.
    pub container_ext: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            container_ext: "mkv".to_string(),
        }
    }
}

impl Config {
    /// The ledger separator as a char; validation guarantees exactly one.
    pub fn field_sep_char(&self) -> char {
        self.general.field_sep.chars().next().unwrap_or('\t')
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.general.field_sep.chars().count() != 1 {
            return Err(LingoError::config(
                "general.field_sep must be exactly one character",
            ));
        }
        if self.general.video_extensions.is_empty() {
            return Err(LingoError::config(
                "general.video_extensions must not be empty",
            ));
        }
        if self.pipeline.workers_max == 0 {
            return Err(LingoError::config("pipeline.workers_max must be >= 1"));
        }
        if self.languages.targets.is_empty() {
            return Err(LingoError::config("languages.targets must not be empty"));
        }
        if self.stt.enabled && self.stt.timeout_seconds == 0 {
            return Err(LingoError::config("stt.timeout_seconds must be >= 1"));
        }
        if self.translit.enabled {
            if self.translit.max_per_key == 0 {
                return Err(LingoError::config("translit.max_per_key must be >= 1"));
            }
            for style in &self.translit.styles {
                if crate::services::translit::TranslitStyle::parse(style).is_none() {
                    return Err(LingoError::config(format!(
                        "translit.styles: unknown style '{}'",
                        style
                    )));
                }
            }
        }
        Ok(())
    }
}
