//! Standard MIDI File encoding and decoding
//!
//! Files are SMF format 1 at 220 ticks per quarter note and a fixed
//! 120 BPM, so one second is exactly 440 ticks. Track 0 carries the tempo
//! map; every `(instrument, program, is_drum)` group gets its own track,
//! named `Instrument <id>` so the grouping survives a round trip. A group
//! whose repeated pitches overlap is spread over extra tracks of the same
//! name, since a single channel cannot hold two sounding copies of a key.

use crate::storage::ArtifactKind;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use mts_common::{Error, NoteEvent, NoteSequence, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TICKS_PER_QUARTER: u16 = 220;
pub const DEFAULT_QPM: f64 = 120.0;
/// Microseconds per quarter note at 120 BPM
const DEFAULT_TEMPO_USPQ: u32 = 500_000;
const DRUM_CHANNEL: u8 = 9;
const MAX_DELTA: u32 = 0x0FFF_FFFF;
const TRACK_NAME_PREFIX: &str = "Instrument ";

/// Ticks per second at the default tempo
pub fn ticks_per_second() -> f64 {
    TICKS_PER_QUARTER as f64 * DEFAULT_QPM / 60.0
}

fn seconds_to_ticks(seconds: f64) -> u32 {
    (seconds * ticks_per_second()).round().clamp(0.0, MAX_DELTA as f64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TrackKey {
    instrument: u32,
    program: u8,
    is_drum: bool,
}

/// A group's notes as absolute `(on, off)` ticks
struct Layer<'a> {
    notes: Vec<(u32, u32, &'a NoteEvent)>,
    /// Off tick of the last note placed here, per pitch
    sounding_until: HashMap<u8, u32>,
}

/// Split a group so that no two notes of one pitch overlap on a track.
///
/// A note goes to the first layer where its pitch is silent at its onset.
/// Sequences without overlapping repeats stay on a single layer.
fn split_layers<'a>(notes: &[&'a NoteEvent]) -> Vec<Layer<'a>> {
    let mut layers: Vec<Layer<'a>> = Vec::new();
    for note in notes {
        let on = seconds_to_ticks(note.start_time);
        let off = seconds_to_ticks(note.end_time).max(on + 1);

        let free = layers
            .iter()
            .position(|layer| layer.sounding_until.get(&note.pitch).map_or(true, |until| *until <= on));
        let index = match free {
            Some(index) => index,
            None => {
                layers.push(Layer {
                    notes: Vec::new(),
                    sounding_until: HashMap::new(),
                });
                layers.len() - 1
            }
        };
        layers[index].notes.push((on, off, note));
        layers[index].sounding_until.insert(note.pitch, off);
    }
    layers
}

/// One channel per melodic track, skipping the drum channel and wrapping
/// after the 15 melodic channels are used.
fn assign_channels(keys: &[TrackKey]) -> Vec<u8> {
    let melodic: Vec<u8> = (0u8..16).filter(|c| *c != DRUM_CHANNEL).collect();
    let mut next = 0usize;
    keys.iter()
        .map(|key| {
            if key.is_drum {
                DRUM_CHANNEL
            } else {
                let channel = melodic[next % melodic.len()];
                next += 1;
                channel
            }
        })
        .collect()
}

/// Encode a note sequence as SMF bytes
///
/// Deterministic: the same sequence always yields the same bytes.
pub fn sequence_to_midi(sequence: &NoteSequence) -> Result<Vec<u8>> {
    let mut groups: BTreeMap<TrackKey, Vec<&NoteEvent>> = BTreeMap::new();
    for note in sequence.notes() {
        let key = TrackKey {
            instrument: note.instrument,
            program: note.program,
            is_drum: note.is_drum,
        };
        groups.entry(key).or_default().push(note);
    }

    let mut note_tracks: Vec<(TrackKey, Layer)> = Vec::new();
    for (key, notes) in &groups {
        let layers = split_layers(notes);
        if layers.len() > 1 {
            debug!(instrument = key.instrument, layers = layers.len(), "Overlapping repeated pitches");
        }
        note_tracks.extend(layers.into_iter().map(|layer| (*key, layer)));
    }

    let keys: Vec<TrackKey> = note_tracks.iter().map(|(key, _)| *key).collect();
    let channels = assign_channels(&keys);
    let names: Vec<String> = keys
        .iter()
        .map(|k| format!("{}{}", TRACK_NAME_PREFIX, k.instrument))
        .collect();

    let mut tracks: Vec<Vec<TrackEvent>> = Vec::with_capacity(note_tracks.len() + 1);
    tracks.push(vec![
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(DEFAULT_TEMPO_USPQ))),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]);

    for (((key, layer), channel), name) in note_tracks.iter().zip(&channels).zip(&names) {
        let channel = u4::from(*channel);

        // (tick, is_note_on, pitch, velocity); offs sort before ons at equal ticks
        let mut timed: Vec<(u32, bool, u8, u8)> = Vec::with_capacity(layer.notes.len() * 2);
        for (on, off, note) in &layer.notes {
            timed.push((*on, true, note.pitch, note.velocity));
            timed.push((*off, false, note.pitch, 0));
        }
        timed.sort_by_key(|(tick, is_on, pitch, _)| (*tick, *is_on, *pitch));

        let mut events = Vec::with_capacity(timed.len() + 3);
        events.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        });
        events.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::from(key.program),
                },
            },
        });

        let mut last_tick = 0u32;
        for (tick, is_on, pitch, velocity) in timed {
            let message = if is_on {
                MidiMessage::NoteOn {
                    key: u7::from(pitch),
                    vel: u7::from(velocity),
                }
            } else {
                MidiMessage::NoteOff {
                    key: u7::from(pitch),
                    vel: u7::from(0),
                }
            };
            events.push(TrackEvent {
                delta: u28::from(tick - last_tick),
                kind: TrackEventKind::Midi { channel, message },
            });
            last_tick = tick;
        }

        events.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        tracks.push(events);
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::from(TICKS_PER_QUARTER)),
        },
        tracks,
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| Error::processing("midi", format!("failed to write MIDI data: {:?}", e)))?;

    debug!(
        notes = sequence.len(),
        tracks = note_tracks.len() + 1,
        bytes = bytes.len(),
        "Encoded MIDI"
    );
    Ok(bytes)
}

/// Converts absolute ticks to seconds through a tempo map
struct TempoMap {
    /// (tick, seconds at tick, microseconds per quarter from tick on)
    segments: Vec<(u64, f64, u32)>,
    ticks_per_quarter: f64,
}

impl TempoMap {
    fn new(mut changes: Vec<(u64, u32)>, ticks_per_quarter: u16) -> Self {
        changes.sort_by_key(|(tick, _)| *tick);
        let tpq = ticks_per_quarter as f64;

        let mut segments = vec![(0u64, 0.0f64, DEFAULT_TEMPO_USPQ)];
        for (tick, uspq) in changes {
            let (last_tick, last_secs, last_uspq) = segments[segments.len() - 1];
            let secs = last_secs + (tick - last_tick) as f64 * last_uspq as f64 / 1e6 / tpq;
            if tick == last_tick {
                segments.pop();
            }
            segments.push((tick, secs, uspq));
        }

        Self {
            segments,
            ticks_per_quarter: tpq,
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        let (seg_tick, seg_secs, uspq) = self
            .segments
            .iter()
            .rev()
            .find(|(t, _, _)| *t <= tick)
            .copied()
            .unwrap_or((0, 0.0, DEFAULT_TEMPO_USPQ));
        seg_secs + (tick - seg_tick) as f64 * uspq as f64 / 1e6 / self.ticks_per_quarter
    }
}

/// Parse SMF bytes back into a note sequence
///
/// Note-on/note-off pairs are matched first-in first-out per
/// `(channel, key)`. Notes still sounding at the end of a track are closed
/// at its last event.
pub fn midi_to_sequence(bytes: &[u8]) -> Result<NoteSequence> {
    let smf = Smf::parse(bytes).map_err(|e| Error::processing("midi", format!("invalid MIDI file: {}", e)))?;

    let to_seconds: Box<dyn Fn(u64) -> f64> = match smf.header.timing {
        Timing::Metrical(tpq) => {
            let mut changes = Vec::new();
            for track in &smf.tracks {
                let mut tick = 0u64;
                for event in track {
                    tick += event.delta.as_int() as u64;
                    if let TrackEventKind::Meta(MetaMessage::Tempo(uspq)) = event.kind {
                        changes.push((tick, uspq.as_int()));
                    }
                }
            }
            let map = TempoMap::new(changes, tpq.as_int().max(1));
            Box::new(move |tick| map.seconds(tick))
        }
        Timing::Timecode(fps, subframe) => {
            let ticks_per_second = fps.as_f32() as f64 * subframe as f64;
            Box::new(move |tick| tick as f64 / ticks_per_second)
        }
    };

    let mut notes = Vec::new();
    for (index, track) in smf.tracks.iter().enumerate() {
        let mut instrument: Option<u32> = None;
        let mut programs: HashMap<u8, u8> = HashMap::new();
        let mut open: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();
        let mut tick = 0u64;

        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    instrument = std::str::from_utf8(name)
                        .ok()
                        .and_then(|n| n.strip_prefix(TRACK_NAME_PREFIX))
                        .and_then(|id| id.trim().parse().ok());
                }
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs.insert(channel, program.as_int());
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open.entry((channel, key.as_int()))
                                .or_default()
                                .push_back((tick, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let pitch = key.as_int();
                            match open.get_mut(&(channel, pitch)).and_then(|q| q.pop_front()) {
                                Some((start, velocity)) => notes.push(build_note(
                                    &to_seconds,
                                    (start, tick),
                                    (channel, pitch, velocity),
                                    instrument.unwrap_or(index as u32),
                                    programs.get(&channel).copied().unwrap_or(0),
                                )),
                                None => debug!(channel, pitch, tick, "Note-off without note-on"),
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        for ((channel, pitch), pending) in open {
            for (start, velocity) in pending {
                warn!(channel, pitch, "Closing note left open at end of track");
                notes.push(build_note(
                    &to_seconds,
                    (start, tick),
                    (channel, pitch, velocity),
                    instrument.unwrap_or(index as u32),
                    programs.get(&channel).copied().unwrap_or(0),
                ));
            }
        }
    }

    NoteSequence::from_events(notes)
}

fn build_note(
    to_seconds: &dyn Fn(u64) -> f64,
    (start, end): (u64, u64),
    (channel, pitch, velocity): (u8, u8, u8),
    instrument: u32,
    program: u8,
) -> NoteEvent {
    let mut note = NoteEvent::new(to_seconds(start), to_seconds(end), pitch, velocity)
        .with_instrument(instrument, program);
    note.is_drum = channel == DRUM_CHANNEL;
    note
}

/// Encode and write `<stem>_transcribed.mid` into `dir`
pub fn write_midi(sequence: &NoteSequence, dir: &Path, stem: &str) -> Result<PathBuf> {
    let bytes = sequence_to_midi(sequence)?;
    let path = dir.join(ArtifactKind::Midi.file_name(stem));
    std::fs::write(&path, bytes)?;
    debug!(path = %path.display(), "Wrote MIDI file");
    Ok(path)
}
