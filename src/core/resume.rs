//! Resumption detection against the append-only output ledger.
//!
//! The ledger is the sole source of durable state: a cue counts as done iff
//! its `<sep>timecode<sep>` needle appears in the ledger written by a prior
//! run. The file is read once at open and queried by substring, so corrupt
//! lines are benign (at worst they produce a spurious "already done" for a
//! cue whose timecode literally appears in them).
//!
//! Cues sharing an identical start time collapse to one needle; source
//! subtitles are expected to have unique start times.

use std::path::Path;

use log::debug;

use crate::Result;

/// Read-once substring oracle over the output ledger.
#[derive(Debug, Clone, Default)]
pub struct ResumptionStore {
    content: String,
}

impl ResumptionStore {
    /// Load the ledger at `path`. A missing file yields an empty store, so
    /// every query answers false on a fresh run.
    pub fn open(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(
            "resumption store: {} bytes from {}",
            content.len(),
            path.display()
        );
        Ok(Self { content })
    }

    /// A store with no prior state (fresh run, or tests).
    pub fn empty() -> Self {
        Self::default()
    }

    /// True iff the needle occurs in the ledger content.
    pub fn is_already_processed(&self, needle: &str) -> bool {
        !self.content.is_empty() && self.content.contains(needle)
    }
}

/// Build the resumption needle for a cue timecode: `<sep>timecode<sep>`.
///
/// The surrounding separators make the match unique: the timecode occupies a
/// fixed field position, so the needle appears exactly once per completed cue
/// and nowhere else.
pub fn search_needle(field_sep: char, timecode: &str) -> String {
    format!("{}{}{}", field_sep, timecode, field_sep)
}
