//! Run entry points: scan a directory, then render every equation found.
//!
//! ## Why one equation at a time?
//!
//! Each equation shells out to a TeX engine and a rasteriser, both of which
//! are heavy, single-threaded processes with their own scratch files. The
//! orchestrator runs them strictly in scan order: every equation's blocking
//! work goes through `spawn_blocking` and is awaited before the next one
//! starts, so tokio workers never stall and output order matches ordinals.

use crate::config::RunConfig;
use crate::error::{EquationError, Tex2ImgError, ToolError};
use crate::output::{EquationResult, ManifestEntry, RunOutput, RunStats, ScanReport};
use crate::pipeline::scan::{EquationSpan, ScanOptions, Scanner};
use crate::pipeline::toolchain::{EquationRenderer, ExternalToolchain};
use crate::pipeline::{document, input, place};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Scan `config.input_dir` and render every equation into `config.output_dir`.
///
/// # Returns
/// `Ok(RunOutput)` whenever the run could proceed, even if some equations
/// failed to render (check `output.stats.failed`) or none were found.
///
/// # Errors
/// Returns `Err(Tex2ImgError)` only for fatal errors:
/// - input directory missing, not a directory, or unreadable
/// - output directory not writable
/// - a required external tool is not installed
/// - `manifest.json` could not be written
pub async fn render_directory(config: &RunConfig) -> Result<RunOutput, Tex2ImgError> {
    let total_start = Instant::now();

    // ── Step 1: Validate directories ─────────────────────────────────────
    let input_dir = input::resolve_input_dir(&config.input_dir)?;
    place::prepare_output_dir(&config.output_dir)?;
    info!(
        "Rendering equations from {} into {}",
        input_dir.display(),
        config.output_dir.display()
    );

    // ── Step 2: Scan ─────────────────────────────────────────────────────
    let report = scan_blocking(input_dir.clone(), ScanOptions::from(config)).await?;
    let total = report.spans.len();
    info!(
        "Found {} equations in {} files ({} skipped as trivial, {} warnings)",
        total,
        report.files_scanned,
        report.skipped,
        report.warnings.len()
    );
    if total == 0 {
        warn!("No equations found under {}", input_dir.display());
    }

    // ── Step 3: Preflight the toolchain ──────────────────────────────────
    let renderer = resolve_renderer(config);
    if total > 0 {
        preflight(Arc::clone(&renderer)).await?;
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 4: Render, one equation at a time ───────────────────────────
    let mut equations = Vec::with_capacity(total);
    for span in report.spans {
        let ordinal = span.ordinal;
        if let Some(ref cb) = config.progress_callback {
            cb.on_equation_start(ordinal, total);
        }

        let result = render_one(Arc::clone(&renderer), span, config).await?;

        match (&result.error, &result.image) {
            (Some(err), _) => {
                warn!("{}", err);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_equation_error(ordinal, total, &err.to_string());
                }
            }
            (None, Some(image)) => {
                debug!("Equation #{} → {}", ordinal, image.display());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_equation_complete(ordinal, total, image);
                }
            }
            (None, None) => {}
        }
        equations.push(result);
    }

    // ── Step 5: Manifest ─────────────────────────────────────────────────
    let manifest = if config.write_manifest {
        let entries: Vec<ManifestEntry> = equations.iter().map(ManifestEntry::from).collect();
        Some(place::write_manifest(&config.output_dir, &entries).await?)
    } else {
        None
    };

    // ── Step 6: Stats ────────────────────────────────────────────────────
    let rendered = equations.iter().filter(|r| r.is_rendered()).count();
    let stats = RunStats {
        files_scanned: report.files_scanned,
        found: total,
        rendered,
        failed: total - rendered,
        skipped: report.skipped,
        warnings: report.warnings.len(),
        duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!("Run complete: {} in {}ms", stats, stats.duration_ms);

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, rendered);
    }

    Ok(RunOutput {
        equations,
        warnings: report.warnings,
        stats,
        manifest,
    })
}

/// Synchronous wrapper around [`render_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn render_directory_sync(config: &RunConfig) -> Result<RunOutput, Tex2ImgError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Tex2ImgError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(render_directory(config))
}

/// Scan without rendering.
///
/// Needs no external tools and writes nothing.
pub async fn scan_directory(config: &RunConfig) -> Result<ScanReport, Tex2ImgError> {
    let input_dir = input::resolve_input_dir(&config.input_dir)?;
    let report = scan_blocking(input_dir, ScanOptions::from(config)).await?;
    info!(
        "Found {} equations in {} files",
        report.spans.len(),
        report.files_scanned
    );
    Ok(report)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn scan_blocking(root: PathBuf, options: ScanOptions) -> Result<ScanReport, Tex2ImgError> {
    tokio::task::spawn_blocking(move || {
        let mut scanner = Scanner::new(&root, options);
        let mut spans = Vec::new();
        let mut warnings = Vec::new();
        for item in scanner.by_ref() {
            match item {
                Ok(span) => spans.push(span),
                Err(issue) => warnings.push(issue),
            }
        }
        ScanReport {
            spans,
            warnings,
            files_scanned: scanner.files_scanned(),
            skipped: scanner.skipped(),
        }
    })
    .await
    .map_err(|e| Tex2ImgError::Internal(format!("Scan task panicked: {}", e)))
}

/// Return the injected renderer or build the external toolchain.
fn resolve_renderer(config: &RunConfig) -> Arc<dyn EquationRenderer> {
    match config.renderer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(ExternalToolchain::new(config.toolchain.clone())),
    }
}

async fn preflight(renderer: Arc<dyn EquationRenderer>) -> Result<(), Tex2ImgError> {
    let checked = tokio::task::spawn_blocking(move || renderer.check_available())
        .await
        .map_err(|e| Tex2ImgError::Internal(format!("Preflight task panicked: {}", e)))?;

    match checked {
        Ok(()) => Ok(()),
        Err(ToolError::Missing { tool }) => Err(Tex2ImgError::ToolMissing { tool }),
        Err(e) => {
            warn!("Toolchain check inconclusive: {}", e);
            Ok(())
        }
    }
}

async fn render_one(
    renderer: Arc<dyn EquationRenderer>,
    span: EquationSpan,
    config: &RunConfig,
) -> Result<EquationResult, Tex2ImgError> {
    let start = Instant::now();
    let density = config.density;
    let output_dir = config.output_dir.clone();

    let (span, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = render_one_blocking(renderer.as_ref(), &span, density, &output_dir);
        (span, outcome)
    })
    .await
    .map_err(|e| Tex2ImgError::Internal(format!("Render task panicked: {}", e)))?;

    let duration_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok((image, width, height)) => Ok(EquationResult {
            span,
            image: Some(image),
            width: Some(width),
            height: Some(height),
            error: None,
            duration_ms,
        }),
        Err(StepFailure::Item(error)) => Ok(EquationResult {
            span,
            image: None,
            width: None,
            height: None,
            error: Some(error),
            duration_ms,
        }),
        Err(StepFailure::Fatal(e)) => Err(e),
    }
}

/// Wrap, typeset, rasterise and place one equation.
///
/// Scratch files live in a per-equation `TempDir`, removed on return
/// whichever way this exits.
fn render_one_blocking(
    renderer: &dyn EquationRenderer,
    span: &EquationSpan,
    density: u32,
    output_dir: &Path,
) -> Result<(PathBuf, u32, u32), StepFailure> {
    let work = tempfile::Builder::new()
        .prefix("tex2img-")
        .tempdir()
        .map_err(|e| Step::Place.failed(span, e))?;

    let tex_file = work.path().join("equation.tex");
    std::fs::write(&tex_file, document::standalone_document(span))
        .map_err(|e| Step::Place.failed(span, e))?;

    let pdf = renderer
        .typeset(&tex_file, work.path())
        .map_err(|e| Step::Typeset.tool_failed(span, e))?;

    let png = work.path().join("equation.png");
    renderer
        .rasterize(&pdf, density, &png)
        .map_err(|e| Step::Rasterize.tool_failed(span, e))?;

    let (width, height) = image::image_dimensions(&png)
        .map_err(|e| Step::Rasterize.failed(span, format!("unreadable PNG: {e}")))?;

    let dest = output_dir.join(place::image_file_name(span.kind, span.ordinal));
    place::place_image(&png, &dest).map_err(|e| Step::Place.failed(span, e))?;

    Ok((dest, width, height))
}

/// How a single equation's processing ended early.
#[derive(Debug)]
enum StepFailure {
    /// Stop the whole run.
    Fatal(Tex2ImgError),
    /// Record against this equation and move on.
    Item(EquationError),
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Typeset,
    Rasterize,
    Place,
}

impl Step {
    fn failed(self, span: &EquationSpan, detail: impl Display) -> StepFailure {
        let ordinal = span.ordinal;
        let file = span.source_file.clone();
        let line = span.line;
        let detail = detail.to_string();
        StepFailure::Item(match self {
            Step::Typeset => EquationError::TypesetFailed {
                ordinal,
                file,
                line,
                detail,
            },
            Step::Rasterize => EquationError::RasterizeFailed {
                ordinal,
                file,
                line,
                detail,
            },
            Step::Place => EquationError::PlaceFailed {
                ordinal,
                file,
                line,
                detail,
            },
        })
    }

    /// A tool that vanished mid-run is as fatal as one missing at preflight.
    fn tool_failed(self, span: &EquationSpan, error: ToolError) -> StepFailure {
        match error {
            ToolError::Missing { tool } => StepFailure::Fatal(Tex2ImgError::ToolMissing { tool }),
            ToolError::Failed { detail, .. } => self.failed(span, detail),
            other => self.failed(span, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EquationKind;
    use crate::pipeline::preamble::Preamble;

    fn span() -> EquationSpan {
        EquationSpan {
            kind: EquationKind::Inline,
            raw_text: "x".into(),
            source_file: PathBuf::from("a.tex"),
            ordinal: 2,
            line: 5,
            environment: None,
            label: None,
            preamble: Arc::new(Preamble::default()),
        }
    }

    #[test]
    fn missing_tool_is_fatal() {
        let failure = Step::Typeset.tool_failed(
            &span(),
            ToolError::Missing {
                tool: "pdflatex".into(),
            },
        );
        assert!(matches!(
            failure,
            StepFailure::Fatal(Tex2ImgError::ToolMissing { ref tool }) if tool == "pdflatex"
        ));
    }

    #[test]
    fn tool_failure_keeps_detail_and_location() {
        let failure = Step::Typeset.tool_failed(
            &span(),
            ToolError::Failed {
                tool: "pdflatex".into(),
                status: "exit status: 1".into(),
                detail: "! Undefined control sequence.".into(),
            },
        );
        match failure {
            StepFailure::Item(EquationError::TypesetFailed {
                ordinal,
                file,
                line,
                detail,
            }) => {
                assert_eq!(ordinal, 2);
                assert_eq!(file, PathBuf::from("a.tex"));
                assert_eq!(line, 5);
                assert_eq!(detail, "! Undefined control sequence.");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn no_output_is_a_rasterize_failure() {
        let failure = Step::Rasterize.tool_failed(
            &span(),
            ToolError::NoOutput {
                tool: "magick".into(),
                expected: PathBuf::from("equation.png"),
            },
        );
        assert!(matches!(
            failure,
            StepFailure::Item(EquationError::RasterizeFailed { .. })
        ));
    }

    #[test]
    fn injected_renderer_takes_precedence() {
        struct Fixed;
        impl EquationRenderer for Fixed {
            fn check_available(&self) -> Result<(), ToolError> {
                Err(ToolError::Missing {
                    tool: "fixed".into(),
                })
            }
            fn typeset(&self, _: &Path, _: &Path) -> Result<PathBuf, ToolError> {
                unreachable!()
            }
            fn rasterize(&self, _: &Path, _: u32, _: &Path) -> Result<(), ToolError> {
                unreachable!()
            }
        }

        let config = RunConfig::builder("src")
            .renderer(Arc::new(Fixed))
            .build()
            .unwrap();
        let err = resolve_renderer(&config).check_available().unwrap_err();
        assert!(matches!(err, ToolError::Missing { ref tool } if tool == "fixed"));
    }
}
