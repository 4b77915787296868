//! ASS/SSA event parsing.
//!
//! Only the `[Events]` section matters to the pipeline; styles and script
//! metadata are skipped. Override tags (`{\...}`) are stripped from dialogue
//! text and `\N`/`\n` soft breaks become real line breaks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use super::Cue;
use crate::Result;
use crate::error::LingoError;

static OVERRIDE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").unwrap());
static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2})\.(\d{2})$").unwrap());

/// Parse ASS/SSA content into cues.
///
/// The `Format:` line inside `[Events]` defines the field order; `Dialogue:`
/// lines are split accordingly (the `Text` field is always last and may
/// contain commas). Comment events and dialogue with empty text are skipped.
pub fn parse_ass(content: &str) -> Result<Vec<Cue>> {
    let mut in_events = false;
    let mut start_field = None;
    let mut end_field = None;
    let mut field_count = 0usize;
    let mut cues = Vec::new();

    for raw in content.lines() {
        let line = raw.trim_start_matches('\u{feff}').trim();
        if line.starts_with('[') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(rest) = line.strip_prefix("Format:") {
            let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
            field_count = fields.len();
            start_field = fields.iter().position(|f| f.eq_ignore_ascii_case("Start"));
            end_field = fields.iter().position(|f| f.eq_ignore_ascii_case("End"));
            continue;
        }

        let Some(rest) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        let (Some(start_idx), Some(end_idx)) = (start_field, end_field) else {
            return Err(LingoError::subtitle_format(
                "ASS",
                "Dialogue before Format line in [Events]",
            ));
        };

        // Text is the last field; splitn keeps its embedded commas intact.
        let parts: Vec<&str> = rest.splitn(field_count, ',').map(str::trim).collect();
        if parts.len() < field_count {
            continue;
        }
        let start = parse_ass_time(parts[start_idx])?;
        let end = parse_ass_time(parts[end_idx])?;
        let text = clean_text(parts[field_count - 1]);
        if text.is_empty() {
            continue;
        }
        cues.push(Cue {
            index: cues.len(),
            start,
            end,
            lines: text,
        });
    }

    Ok(cues)
}

fn parse_ass_time(s: &str) -> Result<Duration> {
    let caps = TIME
        .captures(s)
        .ok_or_else(|| LingoError::subtitle_format("ASS", format!("bad timestamp '{}'", s)))?;
    let field = |i: usize| -> u64 { caps[i].parse().unwrap_or(0) };
    // Centisecond precision in the source.
    Ok(Duration::from_millis(
        field(1) * 3_600_000 + field(2) * 60_000 + field(3) * 1_000 + field(4) * 10,
    ))
}

fn clean_text(text: &str) -> Vec<String> {
    let stripped = OVERRIDE_TAG.replace_all(text, "");
    stripped
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ASS: &str = "[Script Info]\nTitle: sample\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.50,0:00:03.20,Default,,0,0,0,,{\\an8}Hello, World!\nDialogue: 0,0:00:05.00,0:00:08.00,Default,,0,0,0,,First line\\NSecond, with comma\n";

    #[test]
    fn test_ass_parsing_basic() {
        let cues = parse_ass(SAMPLE_ASS).unwrap();
        assert_eq!(cues.len(), 2);

        assert_eq!(cues[0].start, Duration::from_millis(1500));
        assert_eq!(cues[0].end, Duration::from_millis(3200));
        assert_eq!(cues[0].lines, vec!["Hello, World!".to_string()]);

        assert_eq!(
            cues[1].lines,
            vec!["First line".to_string(), "Second, with comma".to_string()]
        );
    }

    #[test]
    fn test_ass_strips_override_tags() {
        let content = "[Events]\nFormat: Layer, Start, End, Text\nDialogue: 0,0:00:01.00,0:00:02.00,{\\pos(1,2)}{\\fad(100,200)}styled\n";
        let cues = parse_ass(content).unwrap();
        assert_eq!(cues[0].lines, vec!["styled".to_string()]);
    }

    #[test]
    fn test_ass_skips_comments_and_empty_text() {
        let content = "[Events]\nFormat: Layer, Start, End, Text\nComment: 0,0:00:01.00,0:00:02.00,a note\nDialogue: 0,0:00:01.00,0:00:02.00,{\\an8}\n";
        let cues = parse_ass(content).unwrap();
        assert!(cues.is_empty());
    }

    #[test]
    fn test_ass_dialogue_before_format_fails() {
        let content = "[Events]\nDialogue: 0,0:00:01.00,0:00:02.00,text\n";
        assert!(parse_ass(content).is_err());
    }

    #[test]
    fn test_ass_ignores_other_sections() {
        let content = "[V4+ Styles]\nFormat: Name, Fontname\nStyle: Default,Arial\n\n[Events]\nFormat: Layer, Start, End, Text\nDialogue: 0,0:00:01.00,0:00:02.00,real\n";
        let cues = parse_ass(content).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].index, 0);
    }

    #[test]
    fn test_ass_time_parsing() {
        assert_eq!(
            parse_ass_time("1:02:03.45").unwrap(),
            Duration::from_millis(3_723_450)
        );
        assert!(parse_ass_time("nonsense").is_err());
    }
}
