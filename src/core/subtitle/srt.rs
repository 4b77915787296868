//! SubRip (.srt) parsing and serialization.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use super::Cue;
use crate::Result;
use crate::error::LingoError;

static TIME_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3}) --> (\d{2}):(\d{2}):(\d{2})[,.](\d{3})")
        .unwrap()
});

/// Parse SRT content into cues.
///
/// Cue indices are assigned from block order; the numeric counters in the
/// file are ignored (they are frequently wrong in the wild). Blocks without
/// a timing line or without text are skipped.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let normalized = content.replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }
        // The timing line is usually second, but counter-less files exist.
        let Some(time_pos) = lines.iter().position(|l| TIME_LINE.is_match(l)) else {
            continue;
        };
        let caps = TIME_LINE.captures(lines[time_pos]).unwrap();
        let start = parse_time(&caps, 1)?;
        let end = parse_time(&caps, 5)?;
        let text: Vec<String> = lines[time_pos + 1..]
            .iter()
            .map(|l| l.to_string())
            .collect();
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

/// Serialize cues as SRT text with 1-based counters.
pub fn serialize_srt(cues: &[Cue]) -> String {
    let mut output = String::new();
    for (i, cue) in cues.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_duration(cue.start),
            format_duration(cue.end)
        ));
        output.push_str(&cue.lines.join("\n"));
        output.push_str("\n\n");
    }
    output
}

fn parse_time(caps: &regex::Captures, start_group: usize) -> Result<Duration> {
    let field = |i: usize| -> Result<u64> {
        caps[start_group + i]
            .parse()
            .map_err(|e| LingoError::subtitle_format("SRT", format!("bad time value: {}", e)))
    };
    Ok(Duration::from_millis(
        field(0)? * 3_600_000 + field(1)? * 60_000 + field(2)? * 1_000 + field(3)?,
    ))
}

fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1_000,
        total_ms % 1_000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SRT: &str = "1\n00:00:01,000 --> 00:00:03,000\nHello, World!\n\n2\n00:00:05,000 --> 00:00:08,000\nThis is a test subtitle.\nSecond line\n\n";

    #[test]
    fn test_srt_parsing_basic() {
        let cues = parse_srt(SAMPLE_SRT).unwrap();
        assert_eq!(cues.len(), 2);

        let first = &cues[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.start, Duration::from_millis(1000));
        assert_eq!(first.end, Duration::from_millis(3000));
        assert_eq!(first.lines, vec!["Hello, World!".to_string()]);

        let second = &cues[1];
        assert_eq!(second.index, 1);
        assert_eq!(second.lines.len(), 2);
    }

    #[test]
    fn test_srt_indices_ignore_file_counters() {
        let shuffled = "7\n00:00:01,000 --> 00:00:02,000\nA\n\n3\n00:00:03,000 --> 00:00:04,000\nB\n\n";
        let cues = parse_srt(shuffled).unwrap();
        assert_eq!(cues[0].index, 0);
        assert_eq!(cues[1].index, 1);
    }

    #[test]
    fn test_srt_counterless_blocks() {
        let bare = "00:00:01,000 --> 00:00:02,000\nNo counter here\n\n";
        let cues = parse_srt(bare).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].lines, vec!["No counter here".to_string()]);
    }

    #[test]
    fn test_srt_crlf_and_dot_millis() {
        let crlf = "1\r\n00:00:01.500 --> 00:00:02.500\r\nWindows line endings\r\n\r\n";
        let cues = parse_srt(crlf).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].start, Duration::from_millis(1500));
    }

    #[test]
    fn test_srt_empty_and_malformed_blocks() {
        assert!(parse_srt("").unwrap().is_empty());
        assert!(parse_srt("\n\n\n").unwrap().is_empty());
        // timing line but no text
        assert!(
            parse_srt("1\n00:00:01,000 --> 00:00:03,000\n\n")
                .unwrap()
                .is_empty()
        );
        // no timing line at all
        assert!(parse_srt("just some text\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_srt_serialization_roundtrip() {
        let cues = parse_srt(SAMPLE_SRT).unwrap();
        let serialized = serialize_srt(&cues);
        let reparsed = parse_srt(&serialized).unwrap();
        assert_eq!(cues.len(), reparsed.len());
        for (o, r) in cues.iter().zip(reparsed.iter()) {
            assert_eq!(o.start, r.start);
            assert_eq!(o.end, r.end);
            assert_eq!(o.lines, r.lines);
        }
    }

    #[test]
    fn test_time_parsing_edge_of_day() {
        let edge = "1\n23:59:59,999 --> 23:59:59,999\nEnd of day\n\n";
        let cues = parse_srt(edge).unwrap();
        let expected = Duration::from_millis(23 * 3_600_000 + 59 * 60_000 + 59 * 1_000 + 999);
        assert_eq!(cues[0].start, expected);
    }
}
