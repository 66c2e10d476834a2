//! # tex2img
//!
//! Find the equations in a tree of LaTeX sources and render each one to a
//! PNG image.
//!
//! ## Why this crate?
//!
//! Slides, web pages and alt-text tooling often want a paper's equations as
//! images. Screenshotting a compiled PDF loses the one-to-one mapping back
//! to the source. Instead this crate scans the `.tex` files directly, wraps
//! every equation it finds in a minimal document of its own, and renders
//! that through a real TeX engine, so the image looks exactly as LaTeX
//! would set it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paper/
//!  │
//!  ├─ 1. Input     check the source directory
//!  ├─ 2. Scan      walk *.tex / *.ltx, locate $…$, $$…$$, \[…\], \begin{equation}…
//!  ├─ 3. Wrap      one standalone document per equation (+ the file's macros)
//!  ├─ 4. Typeset   pdflatex, then pdfcrop (spawn_blocking)
//!  ├─ 5. Raster    magick -density N → PNG, dimensions checked
//!  └─ 6. Place     images/<kind>_<ordinal>.png + manifest.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tex2img::{render_directory, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::builder("paper/").output_dir("images").build()?;
//!     let output = render_directory(&config).await?;
//!     eprintln!("{}", output.stats); // "12 found, 11 rendered, 1 failed"
//!     Ok(())
//! }
//! ```
//!
//! ## External Tools
//!
//! | Step | Default | Override |
//! |------|---------|----------|
//! | Typeset | `pdflatex` | [`Toolchain::latex`] |
//! | Crop | `pdfcrop` | [`Toolchain::cropper`] (`None` to skip) |
//! | Rasterise | `magick` | [`Toolchain::rasterizer`] (`convert` on ImageMagick 6) |
//!
//! Scanning alone ([`scan_directory`]) needs none of them.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tex2img` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! tex2img = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EquationKind, EquationKinds, RunConfig, RunConfigBuilder, Toolchain};
pub use error::{EquationError, ScanIssue, Tex2ImgError, ToolError};
pub use output::{EquationResult, ManifestEntry, RunOutput, RunStats, ScanReport};
pub use pipeline::scan::{EquationSpan, ScanOptions, Scanner};
pub use pipeline::toolchain::{EquationRenderer, ExternalToolchain};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use run::{render_directory, render_directory_sync, scan_directory};
