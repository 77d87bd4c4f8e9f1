//! Score engraving with MuseScore
//!
//! Two passes: MIDI → MusicXML, title injected into the XML, then
//! MusicXML → PDF. The intermediate XML never outlives the call.

use crate::process::{remove_stale_output, require_output, run_tool, ScratchFile, ToolCommand};
use mts_common::{Error, Result};
use roxmltree::{Document, ParsingOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

fn engrave_error(message: impl std::fmt::Display) -> Error {
    Error::processing("engrave", message)
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Set the score's `<work><work-title>` to `title`
///
/// Only the affected byte range is rewritten; the rest of the document,
/// DOCTYPE included, is kept verbatim. A `<work-title>` is replaced, a
/// `<work>` without one gains one, and a score without `<work>` gets one as
/// its first child.
///
/// # Errors
/// `Processing { stage: "engrave" }` when the text is not XML or the root
/// is neither `score-partwise` nor `score-timewise`.
pub fn inject_title(xml: &str, title: &str) -> Result<String> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| engrave_error(format!("MusicXML did not parse: {}", e)))?;

    let root = doc.root_element();
    match root.tag_name().name() {
        "score-partwise" | "score-timewise" => {}
        other => return Err(engrave_error(format!("unexpected MusicXML root <{}>", other))),
    }

    let title_element = format!("<work-title>{}</work-title>", escape_text(title));
    let (range, replacement) = match root.children().find(|n| n.has_tag_name("work")) {
        Some(work) => match work.children().find(|n| n.has_tag_name("work-title")) {
            Some(existing) => (existing.range(), title_element),
            None => match work.first_child() {
                Some(child) => {
                    let at = child.range().start;
                    (at..at, title_element)
                }
                None => (work.range(), format!("<work>{}</work>", title_element)),
            },
        },
        None => {
            let anchor = root
                .children()
                .find(|n| n.is_element())
                .ok_or_else(|| engrave_error("MusicXML score has no content"))?;
            let at = anchor.range().start;
            (at..at, format!("<work>{}</work>\n  ", title_element))
        }
    };

    let mut out = String::with_capacity(xml.len() + replacement.len());
    out.push_str(&xml[..range.start]);
    out.push_str(&replacement);
    out.push_str(&xml[range.end..]);
    Ok(out)
}

/// Engrave `midi` to a PDF score titled `title`
///
/// A title that cannot be injected is logged and the untouched MusicXML is
/// engraved instead. `timeout` bounds both passes together.
///
/// # Errors
/// * `NotFound` - MIDI input missing, or no MusicXML after the first pass
/// * `ExternalTool` / `Timeout` - either MuseScore pass failed
pub async fn engrave_score(
    tool: &ToolCommand,
    midi: &Path,
    output: &Path,
    title: &str,
    timeout: Duration,
) -> Result<PathBuf> {
    if !midi.is_file() {
        return Err(Error::NotFound(format!("MIDI file not found: {}", midi.display())));
    }

    let deadline = Instant::now() + timeout;
    let xml = ScratchFile::in_temp_dir("mts_score", "xml");
    remove_stale_output(output).await?;

    run_tool(
        tool,
        vec![midi.as_os_str().to_owned(), "-o".into(), xml.path().as_os_str().to_owned()],
        "engrave",
        timeout,
    )
    .await?;

    let content = match tokio::fs::read_to_string(xml.path()).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!(
                "MusicXML not produced for {}",
                midi.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    match inject_title(&content, title) {
        Ok(titled) => tokio::fs::write(xml.path(), titled).await?,
        Err(e) => warn!(error = %e, "Could not set score title, engraving without it"),
    }

    let budget_exceeded = || Error::Timeout {
        stage: "engrave",
        seconds: timeout.as_secs(),
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(budget_exceeded());
    }
    run_tool(
        tool,
        vec![xml.path().as_os_str().to_owned(), "-o".into(), output.as_os_str().to_owned()],
        "engrave",
        remaining,
    )
    .await
    .map_err(|e| match e {
        Error::Timeout { .. } => budget_exceeded(),
        other => other,
    })?;
    require_output(tool, output)?;

    info!(output = %output.display(), "Engraved score");
    Ok(output.to_path_buf())
}
