//! Result types returned by the scan and render entry points.

use crate::config::EquationKind;
use crate::error::{EquationError, ScanIssue};
use crate::pipeline::scan::EquationSpan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of rendering a single equation.
#[derive(Debug, Clone, Serialize)]
pub struct EquationResult {
    /// The span that was rendered.
    pub span: EquationSpan,

    /// Final path of the PNG, if rendering succeeded.
    pub image: Option<PathBuf>,

    /// Pixel dimensions read back from the PNG.
    pub width: Option<u32>,
    pub height: Option<u32>,

    /// Set when this equation failed; the image fields are then `None`.
    pub error: Option<EquationError>,

    /// Wall-clock time spent on this equation.
    pub duration_ms: u64,
}

impl EquationResult {
    pub fn is_rendered(&self) -> bool {
        self.error.is_none() && self.image.is_some()
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// LaTeX source files opened.
    pub files_scanned: usize,
    /// Equations handed to the renderer.
    pub found: usize,
    /// Equations with an image in the output directory.
    pub rendered: usize,
    /// Equations that failed at some step.
    pub failed: usize,
    /// Spans dropped as trivial before ordinals were assigned.
    pub skipped: usize,
    /// Scan warnings (unterminated openers, unreadable files).
    pub warnings: usize,
    pub duration_ms: u64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} found, {} rendered, {} failed",
            self.found, self.rendered, self.failed
        )
    }
}

/// Everything a render run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// One entry per equation, in ordinal order.
    pub equations: Vec<EquationResult>,
    /// Recoverable scan problems, in the order they were met.
    pub warnings: Vec<ScanIssue>,
    pub stats: RunStats,
    /// Path of `manifest.json`, when one was written.
    pub manifest: Option<PathBuf>,
}

/// Output of a scan-only pass.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub spans: Vec<EquationSpan>,
    pub warnings: Vec<ScanIssue>,
    pub files_scanned: usize,
    pub skipped: usize,
}

/// One line of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub ordinal: usize,
    pub kind: EquationKind,
    pub source: PathBuf,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Image file name relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&EquationResult> for ManifestEntry {
    fn from(r: &EquationResult) -> Self {
        Self {
            ordinal: r.span.ordinal,
            kind: r.span.kind,
            source: r.span.source_file.clone(),
            line: r.span.line,
            label: r.span.label.clone(),
            image: r
                .image
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            width: r.width,
            height: r.height,
            error: r.error.as_ref().map(ToString::to_string),
        }
    }
}
