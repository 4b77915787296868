//! Core processing engine for lingo.
//!
//! This module contains the subsystems that turn one media file plus its
//! subtitle tracks into language-learning artifacts:
//!
//! - `paths` for deriving and sanitizing every output location
//! - `language` for BCP-47 tag parsing and subtag quality scoring
//! - `subtitle` for the cue model and SRT/ASS parsing
//! - `sources` for enumerating and materializing subtitle candidates
//! - `selection` for preference-ordered subtitle and audio track picking
//! - `resume` for ledger-backed resumption detection
//! - `pipeline` for the per-cue processor and the in-order supervisor
//! - `merge` for the final multi-track mux plan

pub mod language;
pub mod merge;
pub mod paths;
pub mod pipeline;
pub mod resume;
pub mod selection;
pub mod sources;
pub mod subtitle;
