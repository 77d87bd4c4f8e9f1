//! Note events and note sequences
//!
//! A `NoteSequence` is the canonical hand-off between inference output and
//! every downstream renderer (MIDI, piano roll, score). Notes are kept in
//! a fixed order so that identical inference output always serializes to
//! identical bytes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Highest value of a 7-bit MIDI data byte
pub const MIDI_MAX: u8 = 127;

/// A single timed note as reported by the inference backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Onset in seconds
    pub start_time: f64,
    /// Release in seconds
    pub end_time: f64,
    /// MIDI pitch (0-127)
    pub pitch: u8,
    /// MIDI velocity (0-127)
    pub velocity: u8,
    /// Instrument id assigned by the model (one MIDI track per instrument)
    #[serde(default)]
    pub instrument: u32,
    /// General MIDI program (0-127)
    #[serde(default)]
    pub program: u8,
    /// Percussion notes are written to the GM drum channel
    #[serde(default)]
    pub is_drum: bool,
}

impl NoteEvent {
    pub fn new(start_time: f64, end_time: f64, pitch: u8, velocity: u8) -> Self {
        Self {
            start_time,
            end_time,
            pitch,
            velocity,
            instrument: 0,
            program: 0,
            is_drum: false,
        }
    }

    pub fn with_instrument(mut self, instrument: u32, program: u8) -> Self {
        self.instrument = instrument;
        self.program = program;
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Reject values that cannot be encoded as MIDI
    pub fn validate(&self) -> Result<()> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(Error::InvalidInput(format!(
                "note times must be finite (start={}, end={})",
                self.start_time, self.end_time
            )));
        }
        if self.start_time < 0.0 || self.end_time < self.start_time {
            return Err(Error::InvalidInput(format!(
                "note ends before it starts (start={}, end={})",
                self.start_time, self.end_time
            )));
        }
        if self.pitch > MIDI_MAX || self.velocity > MIDI_MAX || self.program > MIDI_MAX {
            return Err(Error::InvalidInput(format!(
                "pitch/velocity/program out of MIDI range ({}, {}, {})",
                self.pitch, self.velocity, self.program
            )));
        }
        Ok(())
    }

    fn order(&self, other: &Self) -> Ordering {
        self.start_time
            .total_cmp(&other.start_time)
            .then(self.pitch.cmp(&other.pitch))
            .then(self.instrument.cmp(&other.instrument))
            .then(self.end_time.total_cmp(&other.end_time))
    }
}

/// Ordered collection of note events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<NoteEvent>", into = "Vec<NoteEvent>")]
pub struct NoteSequence {
    notes: Vec<NoteEvent>,
}

impl NoteSequence {
    /// Validate and order raw events
    ///
    /// Order is `(start_time, pitch, instrument, end_time)`.
    pub fn from_events(mut notes: Vec<NoteEvent>) -> Result<Self> {
        for note in &notes {
            note.validate()?;
        }
        notes.sort_by(NoteEvent::order);
        Ok(Self { notes })
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Latest release time, 0.0 when empty
    pub fn total_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end_time).fold(0.0, f64::max)
    }

    pub fn pitch_range(&self) -> Option<(u8, u8)> {
        let min = self.notes.iter().map(|n| n.pitch).min()?;
        let max = self.notes.iter().map(|n| n.pitch).max()?;
        Some((min, max))
    }

    /// Distinct instrument ids in first-appearance order
    pub fn instruments(&self) -> Vec<u32> {
        let mut seen = Vec::new();
        for note in &self.notes {
            if !seen.contains(&note.instrument) {
                seen.push(note.instrument);
            }
        }
        seen
    }

    /// Per-note opacity derived from velocity (`velocity / 128`)
    ///
    /// When every note shares one velocity the values carry no information,
    /// so every alpha is forced to 1.0.
    pub fn normalized_alphas(&self) -> Vec<f64> {
        let uniform = self
            .notes
            .first()
            .map(|first| self.notes.iter().all(|n| n.velocity == first.velocity))
            .unwrap_or(true);

        self.notes
            .iter()
            .map(|n| if uniform { 1.0 } else { n.velocity as f64 / 128.0 })
            .collect()
    }
}

impl TryFrom<Vec<NoteEvent>> for NoteSequence {
    type Error = Error;

    fn try_from(notes: Vec<NoteEvent>) -> Result<Self> {
        NoteSequence::from_events(notes)
    }
}

impl From<NoteSequence> for Vec<NoteEvent> {
    fn from(seq: NoteSequence) -> Self {
        seq.notes
    }
}
