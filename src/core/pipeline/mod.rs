//! The per-item processing core: one cue in, one ledger record out, driven
//! by a bounded-concurrency supervisor that writes strictly in cue order.

pub mod item;
pub mod supervisor;

pub use item::ItemProcessor;
pub use supervisor::{SupervisorOptions, SupervisorReport, run_supervisor};

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::core::subtitle::Cue;

/// The result of processing one cue: everything a ledger line carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedRecord {
    /// Cue index; keys the in-order writer.
    pub index: usize,
    /// True iff the still image existed before processing (the image is the
    /// most expensive artifact and acts as the completion marker).
    pub already_done: bool,
    /// Sound reference, e.g. `[sound:Show_00h01m02s500.ogg]`.
    pub sound_tag: String,
    /// Image reference, e.g. `<img src="Show_00h01m02s500.avif">`.
    pub image_tag: String,
    /// Filename-safe start timecode; the resumption-oracle key.
    pub time_tag: String,
    /// Sanitized output base of the source media.
    pub source: String,
    /// Current cue's foreign text (or its transcript when STT ran).
    pub foreign_curr: String,
    /// Overlapping native-subtitle text, when a native track is present.
    pub native_curr: String,
    /// Previous cue's foreign text.
    pub foreign_prev: String,
    /// Native text overlapping the previous cue.
    pub native_prev: String,
    /// Next cue's foreign text.
    pub foreign_next: String,
    /// Native text overlapping the next cue.
    pub native_next: String,
    /// Cue start timestamp.
    pub start_time: Duration,
}

impl ProcessedRecord {
    /// Render the ledger line (without trailing newline).
    ///
    /// Field order is fixed: source, timecode, image, sound, then
    /// current/previous/next foreign and native text. The separator is
    /// scrubbed from every field, so `<sep>timecode<sep>` appears exactly once
    /// per line and the timecode field stays a reliable resumption oracle.
    pub fn ledger_line(&self, field_sep: char) -> String {
        let fields = [
            &self.source,
            &self.time_tag,
            &self.image_tag,
            &self.sound_tag,
            &self.foreign_curr,
            &self.native_curr,
            &self.foreign_prev,
            &self.native_prev,
            &self.foreign_next,
            &self.native_next,
        ];
        fields
            .iter()
            .map(|f| scrub(f, field_sep))
            .collect::<Vec<_>>()
            .join(&field_sep.to_string())
    }
}

fn scrub(field: &str, field_sep: char) -> String {
    field
        .chars()
        .map(|c| {
            if c == field_sep || c == '\n' || c == '\r' {
                ' '
            } else {
                c
            }
        })
        .collect()
}

/// Contract for processing a single cue. Production wiring uses
/// [`ItemProcessor`]; supervisor tests inject doubles.
#[async_trait]
pub trait CueProcessor: Send + Sync {
    /// Produce the record for one cue, observing cancellation at every
    /// suspension point.
    async fn process(&self, cancel: &CancellationToken, cue: &Cue) -> Result<ProcessedRecord>;
}
