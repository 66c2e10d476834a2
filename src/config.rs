//! Configuration types for a scan-and-render run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. Keeping every knob in one struct lets the CLI, the
//! tests, and embedding callers share a single validated entry point.

use crate::error::Tex2ImgError;
use crate::pipeline::toolchain::EquationRenderer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one run over a directory of LaTeX sources.
///
/// # Example
/// ```rust
/// use tex2img::{EquationKind, EquationKinds, RunConfig};
///
/// let config = RunConfig::builder("paper/")
///     .output_dir("figures/equations")
///     .kinds(EquationKinds::only(EquationKind::Block))
///     .density(600)
///     .build()
///     .unwrap();
/// assert_eq!(config.density, 600);
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Root of the directory tree to scan for `.tex` / `.ltx` files.
    pub input_dir: PathBuf,

    /// Where rendered images (and `manifest.json`) are written. Default: `images`.
    pub output_dir: PathBuf,

    /// Which equation kinds to extract. Default: all three.
    pub kinds: EquationKinds,

    /// Rasterisation density in dots per inch. Default: 300.
    ///
    /// Only the rasteriser sees this value; it never affects which equations
    /// are found.
    pub density: u32,

    /// External programs used by the default renderer.
    pub toolchain: Toolchain,

    /// Pre-constructed renderer. Takes precedence over `toolchain`.
    ///
    /// Tests inject a fake here so the pipeline runs without a TeX install.
    pub renderer: Option<Arc<dyn EquationRenderer>>,

    /// Optional per-equation progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Drop whitespace-only, fully commented-out, and purely numeric spans. Default: true.
    ///
    /// Tables of numbers typeset as `$3.14$` are common in papers and make
    /// poor equation images.
    pub skip_trivial: bool,

    /// Carry each source file's `\usepackage` and macro definitions into the
    /// standalone document. Default: true.
    pub inherit_preamble: bool,

    /// Write `manifest.json` next to the images. Default: true.
    pub write_manifest: bool,
}

impl RunConfig {
    /// Create a new builder for `RunConfig` scanning `input_dir`.
    pub fn builder(input_dir: impl Into<PathBuf>) -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self {
                input_dir: input_dir.into(),
                output_dir: PathBuf::from("images"),
                kinds: EquationKinds::all(),
                density: 300,
                toolchain: Toolchain::default(),
                renderer: None,
                progress_callback: None,
                skip_trivial: true,
                inherit_preamble: true,
                write_manifest: true,
            },
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("kinds", &self.kinds)
            .field("density", &self.density)
            .field("toolchain", &self.toolchain)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn EquationRenderer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .field("skip_trivial", &self.skip_trivial)
            .field("inherit_preamble", &self.inherit_preamble)
            .field("write_manifest", &self.write_manifest)
            .finish()
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn kinds(mut self, kinds: EquationKinds) -> Self {
        self.config.kinds = kinds;
        self
    }

    pub fn density(mut self, dpi: u32) -> Self {
        self.config.density = dpi;
        self
    }

    pub fn toolchain(mut self, toolchain: Toolchain) -> Self {
        self.config.toolchain = toolchain;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn EquationRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn skip_trivial(mut self, v: bool) -> Self {
        self.config.skip_trivial = v;
        self
    }

    pub fn inherit_preamble(mut self, v: bool) -> Self {
        self.config.inherit_preamble = v;
        self
    }

    pub fn write_manifest(mut self, v: bool) -> Self {
        self.config.write_manifest = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, Tex2ImgError> {
        let c = &self.config;
        if c.density == 0 {
            return Err(Tex2ImgError::InvalidConfig(
                "density must be a positive number of DPI".into(),
            ));
        }
        if c.kinds.is_empty() {
            return Err(Tex2ImgError::InvalidConfig(
                "at least one equation type must be selected".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Tex2ImgError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        if c.toolchain.latex.is_empty() || c.toolchain.rasterizer.is_empty() {
            return Err(Tex2ImgError::InvalidConfig(
                "LaTeX and rasteriser programs must be named".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Equation kinds ───────────────────────────────────────────────────────

/// The three syntactic families of LaTeX math the scanner recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquationKind {
    /// `\begin{equation}…\end{equation}` and the other display environments.
    Block,
    /// `$$…$$` or `\[…\]`.
    Display,
    /// `$…$`.
    Inline,
}

impl EquationKind {
    pub const ALL: [EquationKind; 3] = [
        EquationKind::Block,
        EquationKind::Display,
        EquationKind::Inline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EquationKind::Block => "block",
            EquationKind::Display => "display",
            EquationKind::Inline => "inline",
        }
    }
}

impl fmt::Display for EquationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`EquationKind`]s selected for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquationKinds {
    pub block: bool,
    pub display: bool,
    pub inline: bool,
}

impl EquationKinds {
    /// Every kind (the CLI's `all`).
    pub fn all() -> Self {
        Self {
            block: true,
            display: true,
            inline: true,
        }
    }

    /// The empty set.
    pub fn none() -> Self {
        Self {
            block: false,
            display: false,
            inline: false,
        }
    }

    /// A set with exactly one kind.
    pub fn only(kind: EquationKind) -> Self {
        Self::none().with(kind)
    }

    /// This set plus `kind`.
    pub fn with(mut self, kind: EquationKind) -> Self {
        match kind {
            EquationKind::Block => self.block = true,
            EquationKind::Display => self.display = true,
            EquationKind::Inline => self.inline = true,
        }
        self
    }

    pub fn contains(&self, kind: EquationKind) -> bool {
        match kind {
            EquationKind::Block => self.block,
            EquationKind::Display => self.display,
            EquationKind::Inline => self.inline,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.block || self.display || self.inline)
    }
}

impl Default for EquationKinds {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<EquationKind> for EquationKinds {
    fn from_iter<I: IntoIterator<Item = EquationKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

// ── Toolchain ────────────────────────────────────────────────────────────

/// Program names and fixed options for the external rendering tools.
///
/// The default chain is `pdflatex` → `pdfcrop` → `magick`, the stock tools
/// of a TeX Live + ImageMagick 7 install. On ImageMagick 6 set
/// `rasterizer` to `convert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// LaTeX engine producing a PDF. Default: `pdflatex`.
    pub latex: String,

    /// PDF cropper run after typesetting; `None` skips cropping. Default: `pdfcrop`.
    ///
    /// Without cropping the image is a full page with the equation
    /// somewhere near the top.
    pub cropper: Option<String>,

    /// Margin in PostScript points passed to the cropper. Default: 3.
    pub crop_margin: u32,

    /// Rasteriser turning the PDF into a PNG. Default: `magick`.
    pub rasterizer: String,

    /// PNG quality passed to the rasteriser. Default: 90.
    pub quality: u32,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            latex: "pdflatex".into(),
            cropper: Some("pdfcrop".into()),
            crop_margin: 3,
            rasterizer: "magick".into(),
            quality: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let c = RunConfig::builder("src").build().unwrap();
        assert_eq!(c.output_dir, PathBuf::from("images"));
        assert_eq!(c.density, 300);
        assert_eq!(c.kinds, EquationKinds::all());
        assert!(c.skip_trivial);
        assert!(c.inherit_preamble);
        assert!(c.write_manifest);
    }

    #[test]
    fn zero_density_rejected() {
        let err = RunConfig::builder("src").density(0).build().unwrap_err();
        assert!(matches!(err, Tex2ImgError::InvalidConfig(_)));
    }

    #[test]
    fn empty_kind_set_rejected() {
        let err = RunConfig::builder("src")
            .kinds(EquationKinds::none())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("equation type"));
    }

    #[test]
    fn kinds_union_from_iter() {
        let k: EquationKinds = [EquationKind::Block, EquationKind::Inline]
            .into_iter()
            .collect();
        assert!(k.contains(EquationKind::Block));
        assert!(!k.contains(EquationKind::Display));
        assert!(k.contains(EquationKind::Inline));
    }

    #[test]
    fn kind_serialises_lowercase() {
        let json = serde_json::to_string(&EquationKind::Display).unwrap();
        assert_eq!(json, "\"display\"");
    }

    #[test]
    fn debug_hides_injected_renderer() {
        let c = RunConfig::builder("src").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("renderer: None"), "got: {dbg}");
    }
}
