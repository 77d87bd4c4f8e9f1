//! # Music Transcriber Common Library
//!
//! Shared code for the transcription server and the command-line front-end:
//! - Error taxonomy (`Error` enum)
//! - Bootstrap configuration and output directory layout
//! - Model selectors and their checkpoint identifiers
//! - Note event / note sequence records produced by inference

pub mod config;
pub mod error;
pub mod model;
pub mod notes;

pub use error::{Error, Result};
pub use model::ModelSelector;
pub use notes::{NoteEvent, NoteSequence};
