//! Track selection: pick target/native subtitle candidates and an audio
//! stream by language preference.
//!
//! Subtitle selection walks the requested languages in preference order and
//! scores every compatible candidate; audio selection prefers a stereo track
//! in the target language and demotes audio-description flavors.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::language::{LangTag, subtag_quality};
use crate::core::sources::{SubtitleCandidate, SubtitleKind};
use crate::services::mediainfo::AudioInfo;

static DESCRIPTION_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)audio.?description|\bdescri(bed|ption)\b|narration|narrative|commentary")
        .unwrap()
});
static DIALOG_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdialog(ue)?\b").unwrap());
static SIGNS_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsigns?\b").unwrap());

/// Title- and subtype-derived quality for a subtitle candidate.
///
/// Default disposition +100, dialog/dialogue titles +50, signs-only tracks
/// -100, plus the subtype rank scaled by 10.
pub fn title_score(candidate: &SubtitleCandidate) -> i32 {
    let mut score = candidate.subtype as i32 * 10;
    if candidate.is_default {
        score += 100;
    }
    if let Some(title) = &candidate.title {
        if DIALOG_TITLE.is_match(title) {
            score += 50;
        }
        if SIGNS_TITLE.is_match(title) {
            score -= 100;
        }
    }
    score
}

/// Subtitle pick with its provenance.
#[derive(Debug, Clone)]
pub struct SubtitleSelection<'a> {
    /// The winning candidate.
    pub candidate: &'a SubtitleCandidate,
    /// Index into the preference list that matched.
    pub preference_index: usize,
    /// Subtag quality of the winning pairing.
    pub quality: u32,
}

/// Audio pick, with a flag for settling below the requested language.
#[derive(Debug, Clone)]
pub struct AudioSelection<'a> {
    /// The chosen stream.
    pub track: &'a AudioInfo,
    /// True when no track matched the target language and the first
    /// non-description stream was taken instead.
    pub language_mismatch: bool,
}

/// Preference-ordered track selection.
#[derive(Debug, Default, Clone)]
pub struct TrackSelector;

impl TrackSelector {
    /// Create a selector.
    pub fn new() -> Self {
        Self
    }

    /// Choose the best subtitle candidate for the requested languages.
    ///
    /// Every candidate is assigned the lowest preference index whose base
    /// matches and whose subtag is compatible; within the winning index the
    /// order is subtag quality, then subtype, then title score, then input
    /// order.
    pub fn select_subtitle<'a>(
        &self,
        candidates: &'a [SubtitleCandidate],
        preferences: &[LangTag],
    ) -> Option<SubtitleSelection<'a>> {
        let mut best: Option<(usize, u32, SubtitleKind, i32, usize)> = None;

        for (position, candidate) in candidates.iter().enumerate() {
            let Some((pref_index, quality)) = match_preference(candidate, preferences) else {
                continue;
            };
            debug!(
                "subtitle candidate {} ({}) matches preference {} with quality {}",
                position, candidate.language, pref_index, quality
            );
            let entry = (
                pref_index,
                quality,
                candidate.subtype,
                title_score(candidate),
                position,
            );
            if best.map_or(true, |current| is_better(entry, current)) {
                best = Some(entry);
            }
        }

        best.map(|(pref_index, quality, _, _, position)| SubtitleSelection {
            candidate: &candidates[position],
            preference_index: pref_index,
            quality,
        })
    }

    /// Choose an audio stream for the target language.
    ///
    /// Ideal is a target-language stereo track, then any target-language
    /// track, then the first non-description track (reported as a language
    /// mismatch). Description/narration/commentary titles are skipped unless
    /// they are the only remaining option.
    pub fn select_audio<'a>(
        &self,
        tracks: &'a [AudioInfo],
        target: &LangTag,
    ) -> Option<AudioSelection<'a>> {
        if tracks.is_empty() {
            return None;
        }
        let matches_target =
            |t: &AudioInfo| !target.is_und() && t.language.base == target.base;

        if let Some(track) = tracks
            .iter()
            .find(|t| matches_target(t) && t.channel_count == 2 && !is_description(t))
        {
            return Some(AudioSelection {
                track,
                language_mismatch: false,
            });
        }
        if let Some(track) = tracks.iter().find(|t| matches_target(t) && !is_description(t)) {
            return Some(AudioSelection {
                track,
                language_mismatch: false,
            });
        }
        // Descriptions still win over nothing when they match the target.
        if let Some(track) = tracks.iter().find(|t| matches_target(t)) {
            return Some(AudioSelection {
                track,
                language_mismatch: false,
            });
        }
        let track = tracks
            .iter()
            .find(|t| !is_description(t))
            .unwrap_or(&tracks[0]);
        Some(AudioSelection {
            track,
            language_mismatch: true,
        })
    }
}

fn is_better(
    new: (usize, u32, SubtitleKind, i32, usize),
    old: (usize, u32, SubtitleKind, i32, usize),
) -> bool {
    // (preference asc, quality desc, subtype desc, title desc, position asc)
    (new.0, std::cmp::Reverse(new.1), std::cmp::Reverse(new.2), std::cmp::Reverse(new.3), new.4)
        < (old.0, std::cmp::Reverse(old.1), std::cmp::Reverse(old.2), std::cmp::Reverse(old.3), old.4)
}

/// The lowest preference index a candidate matches, with the pairing's
/// subtag quality. `und` candidates match nothing.
fn match_preference(
    candidate: &SubtitleCandidate,
    preferences: &[LangTag],
) -> Option<(usize, u32)> {
    if candidate.language.is_und() {
        return None;
    }
    for (index, requested) in preferences.iter().enumerate() {
        if requested.base != candidate.language.base {
            continue;
        }
        let quality = subtag_quality(requested, &candidate.language);
        if quality > 0 {
            return Some((index, quality));
        }
    }
    None
}

/// Whether an audio track's title marks it as description or commentary.
pub fn is_description(track: &AudioInfo) -> bool {
    track
        .title
        .as_deref()
        .is_some_and(|t| DESCRIPTION_TITLE.is_match(t))
}
