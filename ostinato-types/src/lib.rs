//! # ostinato-types
//!
//! Shared type definitions for the ostinato MIDI looper.
//! This crate contains the MIDI message model used across ostinato-core
//! and the ostinato binary, plus the small identifiers that cross crate
//! boundaries.

mod midi;

pub use midi::MidiEvent;

/// Identifies one independent key timeline: (channel, note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteKey {
    pub channel: u8,
    pub note: u8,
}

impl NoteKey {
    pub fn new(channel: u8, note: u8) -> Self {
        Self { channel, note }
    }
}

impl std::fmt::Display for NoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{}:{}", self.channel, self.note)
    }
}

/// What an opened input port feeds into the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// External tempo source: clock pulses derive the unit period.
    Clock,
    /// The playing keyboard: notes and modifier CCs.
    Main,
    /// Secondary control surface: transport buttons.
    Meta,
}

impl std::fmt::Display for SourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRole::Clock => write!(f, "clock"),
            SourceRole::Main => write!(f, "main"),
            SourceRole::Meta => write!(f, "meta"),
        }
    }
}
