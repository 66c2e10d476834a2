//! Error types for the tex2img library.
//!
//! Four error types cover four different scopes:
//!
//! * [`Tex2ImgError`] (**Fatal**): the run cannot proceed at all (missing
//!   input directory, unwritable output directory, no `pdflatex` on PATH).
//!   Returned as `Err(Tex2ImgError)` from the top-level `render_*` and
//!   `scan_*` functions.
//!
//! * [`ScanIssue`] (**Non-fatal, scan time**): an opener with no closer, or
//!   a file that could not be read. The scan skips it and carries on.
//!
//! * [`EquationError`] (**Non-fatal, render time**): a single equation
//!   failed to typeset, rasterise, or land in the output directory. Stored
//!   inside [`crate::output::EquationResult`] so one bad equation never
//!   loses the rest of the batch.
//!
//! * [`ToolError`]: what an [`crate::pipeline::toolchain::EquationRenderer`]
//!   reports. The orchestrator attaches file/line context and turns it into
//!   an [`EquationError`], except for [`ToolError::Missing`], which is fatal.

use crate::config::EquationKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tex2img library.
#[derive(Debug, Error)]
pub enum Tex2ImgError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory was not found at the given path.
    #[error("Input directory not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input path exists but is a regular file.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Process does not have read permission on the directory.
    #[error("Permission denied reading '{path}'\nTry: chmod +rx {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory could not be created or is not writable.
    #[error("Output directory '{path}' is not writable: {source}")]
    OutputDirUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write `manifest.json`.
    #[error("Failed to write manifest '{path}': {source}")]
    ManifestWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Toolchain errors ──────────────────────────────────────────────────
    /// An external program the renderer needs is not installed.
    #[error(
        "External tool '{tool}' was not found on PATH.\n\n\
No equation can be rendered without it. You can:\n\
  • Install a TeX distribution (pdflatex, pdfcrop) and ImageMagick (magick).\n\
  • Point --latex / --cropper / --rasterizer at an existing binary.\n\
  • Skip cropping with --no-crop if only pdfcrop is missing.\n"
    )]
    ToolMissing { tool: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable problem met while scanning sources.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ScanIssue {
    /// An opening delimiter with no matching closer; the opener is skipped.
    #[error("{file}:{line}: unterminated {kind} equation starting at '{opener}', skipped")]
    Unterminated {
        file: PathBuf,
        line: usize,
        kind: EquationKind,
        opener: String,
    },

    /// A source file or directory entry that could not be read.
    #[error("{path}: could not read: {detail}")]
    Unreadable { path: PathBuf, detail: String },
}

/// A non-fatal error for a single equation.
///
/// Stored alongside [`crate::output::EquationResult`] when rendering fails.
/// Every variant names the equation's ordinal, source file and line so the
/// offending span can be found again.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum EquationError {
    /// The typesetting step (LaTeX or the cropper) failed.
    #[error("Equation #{ordinal} ({file}:{line}): typesetting failed: {detail}")]
    TypesetFailed {
        ordinal: usize,
        file: PathBuf,
        line: usize,
        detail: String,
    },

    /// The rasteriser failed or produced an unreadable image.
    #[error("Equation #{ordinal} ({file}:{line}): rasterisation failed: {detail}")]
    RasterizeFailed {
        ordinal: usize,
        file: PathBuf,
        line: usize,
        detail: String,
    },

    /// Writing the scratch document or moving the image into place failed.
    #[error("Equation #{ordinal} ({file}:{line}): could not write output: {detail}")]
    PlaceFailed {
        ordinal: usize,
        file: PathBuf,
        line: usize,
        detail: String,
    },
}

/// Failure reported by one external tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be spawned because it does not exist.
    #[error("'{tool}' was not found on PATH")]
    Missing { tool: String },

    /// The program ran and exited unsuccessfully.
    #[error("'{tool}' exited with {status}: {detail}")]
    Failed {
        tool: String,
        status: String,
        detail: String,
    },

    /// The program exited successfully but the expected file is absent.
    #[error("'{tool}' reported success but did not produce '{expected}'")]
    NoOutput { tool: String, expected: PathBuf },

    /// Spawning or waiting on the program failed for another reason.
    #[error("I/O error running '{tool}': {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// Classify a spawn error: `NotFound` means the tool is not installed.
    pub fn from_spawn(tool: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ToolError::Missing {
                tool: tool.to_string(),
            }
        } else {
            ToolError::Io {
                tool: tool.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unterminated_display_names_file_and_line() {
        let e = ScanIssue::Unterminated {
            file: PathBuf::from("chapters/intro.tex"),
            line: 12,
            kind: EquationKind::Block,
            opener: "\\begin{equation}".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("chapters/intro.tex:12"), "got: {msg}");
        assert!(msg.contains("block"), "got: {msg}");
        assert!(msg.contains("\\begin{equation}"), "got: {msg}");
    }

    #[test]
    fn typeset_failure_display() {
        let e = EquationError::TypesetFailed {
            ordinal: 7,
            file: PathBuf::from("paper.tex"),
            line: 40,
            detail: "! Undefined control sequence.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("#7"), "got: {msg}");
        assert!(msg.contains("paper.tex:40"), "got: {msg}");
        assert!(msg.contains("Undefined control sequence"), "got: {msg}");
    }

    #[test]
    fn tool_missing_display_mentions_tool() {
        let e = Tex2ImgError::ToolMissing {
            tool: "magick".into(),
        };
        assert!(e.to_string().contains("'magick'"));
    }

    #[test]
    fn spawn_not_found_maps_to_missing() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        assert!(matches!(
            ToolError::from_spawn("pdflatex", io),
            ToolError::Missing { ref tool } if tool == "pdflatex"
        ));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            ToolError::from_spawn("pdflatex", io),
            ToolError::Io { .. }
        ));
    }
}
