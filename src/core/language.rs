//! BCP-47 language tag handling.
//!
//! Provides parsing of BCP-47 tags (including extended-language subtags) into
//! `{ISO-639-3 base, optional script/region subtag}` pairs, the default-script
//! table, subtag compatibility and quality scoring used by track selection,
//! and filename-based language guessing for standalone subtitle files.
//!
//! # Examples
//!
//! ```rust
//! use lingo_cli::core::language::LangTag;
//!
//! let tag = LangTag::parse("zh-yue-Hans").unwrap();
//! assert_eq!(tag.base, "yue");
//! assert_eq!(tag.subtag.as_deref(), Some("hans"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::Result;
use crate::error::LingoError;

/// A parsed language tag: an ISO-639-3 base code plus an optional lowercase
/// subtag (2-letter region or 4-letter script).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LangTag {
    /// ISO-639-3 base code; `"und"` when undetermined.
    pub base: String,
    /// Lowercase region ("us") or script ("hans") subtag, if any.
    pub subtag: Option<String>,
}

static ISO_639_1_TO_3: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("aa", "aar"),
        ("ab", "abk"),
        ("af", "afr"),
        ("am", "amh"),
        ("ar", "ara"),
        ("az", "aze"),
        ("be", "bel"),
        ("bg", "bul"),
        ("bn", "ben"),
        ("bo", "bod"),
        ("bs", "bos"),
        ("ca", "cat"),
        ("cs", "ces"),
        ("cy", "cym"),
        ("da", "dan"),
        ("de", "deu"),
        ("el", "ell"),
        ("en", "eng"),
        ("es", "spa"),
        ("et", "est"),
        ("eu", "eus"),
        ("fa", "fas"),
        ("fi", "fin"),
        ("fr", "fra"),
        ("ga", "gle"),
        ("gl", "glg"),
        ("he", "heb"),
        ("hi", "hin"),
        ("hr", "hrv"),
        ("hu", "hun"),
        ("hy", "hye"),
        ("id", "ind"),
        ("is", "isl"),
        ("it", "ita"),
        ("ja", "jpn"),
        ("ka", "kat"),
        ("kk", "kaz"),
        ("km", "khm"),
        ("kn", "kan"),
        ("ko", "kor"),
        ("lo", "lao"),
        ("lt", "lit"),
        ("lv", "lav"),
        ("mk", "mkd"),
        ("ml", "mal"),
        ("mn", "mon"),
        ("mr", "mar"),
        ("ms", "msa"),
        ("my", "mya"),
        ("nb", "nob"),
        ("ne", "nep"),
        ("nl", "nld"),
        ("nn", "nno"),
        ("no", "nor"),
        ("pa", "pan"),
        ("pl", "pol"),
        ("pt", "por"),
        ("ro", "ron"),
        ("ru", "rus"),
        ("si", "sin"),
        ("sk", "slk"),
        ("sl", "slv"),
        ("sq", "sqi"),
        ("sr", "srp"),
        ("sv", "swe"),
        ("sw", "swa"),
        ("ta", "tam"),
        ("te", "tel"),
        ("th", "tha"),
        ("tl", "tgl"),
        ("tr", "tur"),
        ("uk", "ukr"),
        ("ur", "urd"),
        ("uz", "uzb"),
        ("vi", "vie"),
        ("zh", "zho"),
    ])
});

// ISO-639-2 bibliographic aliases normalized to terminological codes.
static ISO_639_2B_TO_3: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("alb", "sqi"),
        ("arm", "hye"),
        ("baq", "eus"),
        ("bur", "mya"),
        ("chi", "zho"),
        ("cze", "ces"),
        ("dut", "nld"),
        ("fre", "fra"),
        ("geo", "kat"),
        ("ger", "deu"),
        ("gre", "ell"),
        ("ice", "isl"),
        ("mac", "mkd"),
        ("may", "msa"),
        ("per", "fas"),
        ("rum", "ron"),
        ("slo", "slk"),
        ("tib", "bod"),
        ("wel", "cym"),
    ])
});

// Codes people type that are not ISO 639-1, with what they meant.
static MISTAKEN_CODES: Lazy<HashMap<&'static str, (&'static str, &'static str)>> =
    Lazy::new(|| {
        HashMap::from([
            ("jp", ("ja", "jpn")),
            ("cn", ("zh", "zho")),
            ("kr", ("ko", "kor")),
            ("gr", ("el", "ell")),
            ("cz", ("cs", "ces")),
            ("ua", ("uk", "ukr")),
        ])
    });

// Extended-language subtags that promote the base to a specific variety.
const EXTLANGS: &[&str] = &["yue", "cmn", "nan", "hak", "wuu", "hsn", "gan", "arb", "arz"];

/// Reverse-map an ISO-639-3 code to its 639-1 form when one exists.
///
/// External services (Whisper among them) speak 639-1; internal state is
/// 639-3 throughout.
pub fn iso639_1(base: &str) -> Option<&'static str> {
    ISO_639_1_TO_3
        .iter()
        .find(|(_, three)| **three == base)
        .map(|(one, _)| *one)
}

/// The default script for a base language, used when a caller requests a
/// language without specifying a script. The table is small and closed; new
/// languages require an explicit entry.
pub fn default_script(base: &str) -> Option<&'static str> {
    match base {
        "zho" | "yue" | "cmn" => Some("hans"),
        _ => None,
    }
}

impl LangTag {
    /// The undetermined-language sentinel.
    pub fn und() -> Self {
        LangTag {
            base: "und".to_string(),
            subtag: None,
        }
    }

    /// True for the `und` sentinel.
    pub fn is_und(&self) -> bool {
        self.base == "und"
    }

    /// Construct a tag from parts, lowercasing both.
    pub fn new(base: &str, subtag: Option<&str>) -> Self {
        LangTag {
            base: base.to_lowercase(),
            subtag: subtag.map(|s| s.to_lowercase()),
        }
    }

    /// Parse a BCP-47 tag.
    ///
    /// The primary subtag is mapped to ISO-639-3; a following extended-language
    /// subtag promotes the base (`zh-yue-Hans` parses as `{yue, hans}`); the
    /// next 4-letter subtag is taken as script, a 2-letter one as region.
    /// Trailing subtags beyond that are ignored. Empty or `und` input yields
    /// the sentinel.
    pub fn parse(tag: &str) -> Result<Self> {
        let norm = tag.trim().to_lowercase();
        if norm.is_empty() || norm == "und" {
            return Ok(Self::und());
        }
        let parts: Vec<&str> = norm.split(['-', '_']).collect();
        let primary = parts[0];
        if !primary.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LingoError::language_tag(format!(
                "invalid primary subtag '{}' in '{}'",
                primary, tag
            )));
        }

        let mut base = match primary.len() {
            2 => match ISO_639_1_TO_3.get(primary) {
                Some(code) => code.to_string(),
                None => {
                    if let Some((one, three)) = MISTAKEN_CODES.get(primary) {
                        return Err(LingoError::language_tag(format!(
                            "unknown code '{}': did you mean '{}' ({})?",
                            primary, one, three
                        )));
                    }
                    return Err(LingoError::language_tag(format!(
                        "unknown ISO 639-1 code '{}'",
                        primary
                    )));
                }
            },
            3 => ISO_639_2B_TO_3
                .get(primary)
                .map(|c| c.to_string())
                .unwrap_or_else(|| primary.to_string()),
            _ => {
                return Err(LingoError::language_tag(format!(
                    "primary subtag '{}' must be 2 or 3 letters",
                    primary
                )));
            }
        };

        // Extlang promotion: zh-yue → yue.
        let mut rest = &parts[1..];
        if let Some(next) = rest.first() {
            if next.len() == 3 && EXTLANGS.contains(next) {
                base = next.to_string();
                rest = &rest[1..];
            }
        }

        let subtag = rest.first().and_then(|p| {
            let alpha = p.chars().all(|c| c.is_ascii_alphabetic());
            match p.len() {
                4 if alpha => Some(p.to_string()),
                2 if alpha => Some(p.to_string()),
                _ => None,
            }
        });

        Ok(LangTag { base, subtag })
    }

    /// Parse a comma- or space-separated preference list, most preferred first.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        list.split([',', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl std::fmt::Display for LangTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subtag {
            Some(sub) => write!(f, "{}-{}", self.base, sub),
            None => f.write_str(&self.base),
        }
    }
}

/// Whether a candidate's subtag is acceptable for a requested tag.
///
/// The bases must already match; this only judges the subtag pair. A specific
/// request tolerates a generic candidate, a generic request tolerates regions
/// and the default script, and a non-default script never matches a generic
/// request.
pub fn subtag_compatible(requested: &LangTag, candidate: &LangTag) -> bool {
    subtag_quality(requested, candidate) > 0
}

/// Quality score of a candidate subtag against a requested one.
///
/// Higher wins; 0 means the pairing is rejected. Exact match 100, both
/// generic 90, default script for the base 85, region "us" 85 / "gb" 80 /
/// other regions 50, generic candidate against a specific request 70,
/// non-default script against a generic request 0.
pub fn subtag_quality(requested: &LangTag, candidate: &LangTag) -> u32 {
    match (&requested.subtag, &candidate.subtag) {
        (Some(r), Some(c)) => {
            if r == c {
                100
            } else {
                0
            }
        }
        (None, None) => 90,
        (None, Some(c)) if c.len() == 4 => {
            if default_script(&candidate.base) == Some(c.as_str()) {
                85
            } else {
                0
            }
        }
        (None, Some(c)) => match c.as_str() {
            "us" => 85,
            "gb" => 80,
            _ => 50,
        },
        (Some(_), None) => 70,
    }
}

static FILENAME_TAG: Lazy<Regex> = Lazy::new(|| {
    // "Show.ja.srt", "Show.zh-Hans.ass", "Show_en-US.srt"
    Regex::new(r"[._-]([A-Za-z]{2,3}(?:-[A-Za-z]{2,4})*)\.[A-Za-z]{3}$").unwrap()
});

/// Resolves language tags for subtitle candidates and media streams.
///
/// Wraps the tag parser with filename guessing so standalone subtitle files
/// without probe metadata still get a language.
#[derive(Debug, Default, Clone)]
pub struct LanguageResolver;

impl LanguageResolver {
    /// Create a resolver with the built-in tables.
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw tag string from probe output, degrading to `und`.
    pub fn resolve_or_und(&self, raw: &str) -> LangTag {
        LangTag::parse(raw).unwrap_or_else(|_| LangTag::und())
    }

    /// Guess the language of a standalone subtitle from its filename.
    ///
    /// Recognizes `name.<tag>.<ext>` patterns; returns `None` when no tag is
    /// present or it does not parse.
    pub fn guess_from_path(&self, path: &Path) -> Option<LangTag> {
        let name = path.file_name()?.to_str()?;
        let cap = FILENAME_TAG.captures(name)?;
        let tag = LangTag::parse(cap.get(1)?.as_str()).ok()?;
        // A bare "cc"/"cap" style marker is a subtitle flavor, not a language.
        if tag.is_und() { None } else { Some(tag) }
    }
}
