//! Derived artifacts rendered from a MIDI file or note sequence
//!
//! Synthesis and engraving shell out to external tools; the piano roll is
//! drawn in-process. Each renderer writes exactly one output file.

pub mod plot;
pub mod score;
pub mod synth;

pub use plot::plot_piano_roll;
pub use score::{engrave_score, inject_title};
pub use synth::synthesize_audio;
