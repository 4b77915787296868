//! Transliteration providers and their lifecycle pool.
//!
//! Providers are heavyweight externals (container startup, model load), so
//! the pipeline never constructs one per cue: the [`pool`] module amortizes
//! initialization across items, bounds instances per language/style key,
//! tracks health, and reaps idle entries.

pub mod pool;
mod provider;

pub use pool::{PoolConfig, PoolManager, global_manager, init_global_manager, shutdown_global_manager};
pub use provider::{HttpProviderFactory, HttpTokenizerProvider, ProviderFactory, TranslitProvider};

use crate::core::language::LangTag;

/// Transliteration output style, driving both provider behavior and the
/// suffix of the subtitle sibling that gets written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslitStyle {
    /// Word-segmented text (`_tokenized`).
    Tokenize,
    /// Fully romanized text (`_romanized`).
    Romanize,
    /// Original text with readings for hard tokens only (`_selective`).
    Selective,
}

impl TranslitStyle {
    /// Wire name of the style.
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslitStyle::Tokenize => "tokenize",
            TranslitStyle::Romanize => "romanize",
            TranslitStyle::Selective => "selective",
        }
    }

    /// Filename suffix of the subtitle sibling this style produces.
    pub fn suffix(&self) -> &'static str {
        match self {
            TranslitStyle::Tokenize => "_tokenized",
            TranslitStyle::Romanize => "_romanized",
            TranslitStyle::Selective => "_selective",
        }
    }

    /// Parse a style name from configuration.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tokenize" | "tokenized" => Some(TranslitStyle::Tokenize),
            "romanize" | "romanized" => Some(TranslitStyle::Romanize),
            "selective" => Some(TranslitStyle::Selective),
            _ => None,
        }
    }
}

/// Identifies one provider pool: language plus output style.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    /// ISO-639-3 language code.
    pub lang_code: String,
    /// Requested output style.
    pub style: TranslitStyle,
}

impl PoolKey {
    /// Build a key from a parsed tag and style.
    pub fn new(lang: &LangTag, style: TranslitStyle) -> Self {
        Self {
            lang_code: lang.base.clone(),
            style,
        }
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.lang_code, self.style.as_str())
    }
}

/// One processed token: the surface form plus its romanization when the
/// provider produced one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslitToken {
    /// Token as it appears in the source text.
    pub surface: String,
    /// Romanized reading, when available.
    pub romanized: Option<String>,
}

/// Provider output for one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslitResult {
    /// Tokens in source order.
    pub tokens: Vec<TranslitToken>,
}

impl TranslitResult {
    /// Render the result in the given style.
    pub fn rendered(&self, style: TranslitStyle) -> String {
        match style {
            TranslitStyle::Tokenize => self
                .tokens
                .iter()
                .map(|t| t.surface.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            TranslitStyle::Romanize => self
                .tokens
                .iter()
                .map(|t| t.romanized.as_deref().unwrap_or(t.surface.as_str()))
                .collect::<Vec<_>>()
                .join(" "),
            TranslitStyle::Selective => self
                .tokens
                .iter()
                .map(|t| match &t.romanized {
                    Some(r) => format!("{}[{}]", t.surface, r),
                    None => t.surface.clone(),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> TranslitResult {
        TranslitResult {
            tokens: vec![
                TranslitToken {
                    surface: "日本語".into(),
                    romanized: Some("nihongo".into()),
                },
                TranslitToken {
                    surface: "OK".into(),
                    romanized: None,
                },
            ],
        }
    }

    #[test]
    fn test_rendered_styles() {
        let r = result();
        assert_eq!(r.rendered(TranslitStyle::Tokenize), "日本語 OK");
        assert_eq!(r.rendered(TranslitStyle::Romanize), "nihongo OK");
        assert_eq!(r.rendered(TranslitStyle::Selective), "日本語[nihongo] OK");
    }

    #[test]
    fn test_style_parse_and_suffix() {
        assert_eq!(TranslitStyle::parse("romanize"), Some(TranslitStyle::Romanize));
        assert_eq!(TranslitStyle::parse("Tokenized"), Some(TranslitStyle::Tokenize));
        assert_eq!(TranslitStyle::parse("nope"), None);
        assert_eq!(TranslitStyle::Selective.suffix(), "_selective");
    }

    #[test]
    fn test_pool_key_display() {
        let key = PoolKey {
            lang_code: "jpn".into(),
            style: TranslitStyle::Romanize,
        };
        assert_eq!(key.to_string(), "jpn/romanize");
    }
}
