//! Piano-roll PNG of a note sequence
//!
//! Text is rasterized with a bundled DejaVu Sans registered under the
//! `sans-serif` family, so no system font lookup is involved.

use mts_common::{Error, NoteSequence, Result};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

pub const PLOT_SIZE: (u32, u32) = (1600, 900);
const FONT_FAMILY: &str = "sans-serif";
static DEJAVU_SANS: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Pastel1 qualitative palette, one colour per instrument (cycled)
const PALETTE: [RGBColor; 9] = [
    RGBColor(251, 180, 174),
    RGBColor(179, 205, 227),
    RGBColor(204, 235, 197),
    RGBColor(222, 203, 228),
    RGBColor(254, 217, 166),
    RGBColor(255, 255, 204),
    RGBColor(229, 216, 189),
    RGBColor(253, 218, 236),
    RGBColor(242, 242, 242),
];

fn plot_error(step: &str, e: impl std::fmt::Debug) -> Error {
    Error::processing("plot", format!("failed to {}: {:?}", step, e))
}

/// Register the bundled font once per process
fn ensure_font() -> Result<()> {
    static REGISTERED: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, DEJAVU_SANS).map_err(|_| "InvalidFont".to_string())
        })
        .clone()
        .map_err(|e| plot_error("load font", e))
}

/// Axis ranges with half a second and two semitones of margin
fn axis_ranges(sequence: &NoteSequence) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let (low, high) = sequence.pitch_range().unwrap_or((60, 60));
    (
        -0.5..sequence.total_time() + 0.5,
        low as f64 - 2.0..high as f64 + 2.0,
    )
}

/// Draw one rectangle per note, `pitch ± 0.5` high, filled with the
/// instrument colour at the note's velocity opacity
///
/// CPU-bound; call from a blocking task.
pub fn plot_piano_roll(sequence: &NoteSequence, stem: &str, output: &Path) -> Result<PathBuf> {
    let colours: HashMap<u32, RGBColor> = sequence
        .instruments()
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, PALETTE[i % PALETTE.len()]))
        .collect();
    let alphas = sequence.normalized_alphas();
    let (x_range, y_range) = axis_ranges(sequence);
    ensure_font()?;

    {
        let root = BitMapBackend::new(output, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(|e| plot_error("fill plot background", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("MIDI sequence of {}", stem), (FONT_FAMILY, 30))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)
            .map_err(|e| plot_error("build chart", e))?;

        chart
            .configure_mesh()
            .label_style((FONT_FAMILY, 16))
            .axis_desc_style((FONT_FAMILY, 20))
            .x_desc("Time(s)")
            .y_desc("Pitch Notes")
            .draw()
            .map_err(|e| plot_error("draw mesh", e))?;

        let corners = |start: f64, end: f64, pitch: u8| {
            [(start, pitch as f64 - 0.5), (end, pitch as f64 + 0.5)]
        };

        chart
            .draw_series(sequence.notes().iter().zip(&alphas).map(|(note, alpha)| {
                let colour = colours.get(&note.instrument).copied().unwrap_or(PALETTE[0]);
                Rectangle::new(
                    corners(note.start_time, note.end_time, note.pitch),
                    colour.mix(*alpha).filled(),
                )
            }))
            .map_err(|e| plot_error("draw notes", e))?;

        chart
            .draw_series(sequence.notes().iter().map(|note| {
                Rectangle::new(
                    corners(note.start_time, note.end_time, note.pitch),
                    BLACK.stroke_width(1),
                )
            }))
            .map_err(|e| plot_error("draw outlines", e))?;

        root.present().map_err(|e| plot_error("write PNG", e))?;
    }

    info!(output = %output.display(), notes = sequence.len(), "Plotted piano roll");
    Ok(output.to_path_buf())
}
