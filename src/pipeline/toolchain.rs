//! External rendering tools: LaTeX → PDF → PNG.
//!
//! Rasterising math ourselves is out of the question; a TeX distribution
//! and ImageMagick already do it well. This module drives them.
//!
//! ## Why a trait?
//!
//! [`EquationRenderer`] is the seam between the orchestrator and the
//! outside world. The default [`ExternalToolchain`] spawns real programs;
//! tests and embedders can inject anything else through
//! [`crate::config::RunConfigBuilder::renderer`]. Every method is blocking:
//! the orchestrator calls them from `spawn_blocking`.
//!
//! The default chain:
//!
//! ```text
//! equation.tex ──pdflatex──▶ equation.pdf ──pdfcrop──▶ equation-crop.pdf ──magick──▶ equation.png
//! ```

use crate::config::Toolchain;
use crate::error::ToolError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Turns a standalone `.tex` file into a PNG in two blocking steps.
pub trait EquationRenderer: Send + Sync {
    /// Confirm the programs this renderer needs are installed.
    ///
    /// Called once before the first equation. Only [`ToolError::Missing`]
    /// stops the run; any other error is logged and rendering proceeds.
    fn check_available(&self) -> Result<(), ToolError> {
        Ok(())
    }

    /// Typeset `tex_file` inside `work_dir`, returning the document to rasterise.
    fn typeset(&self, tex_file: &Path, work_dir: &Path) -> Result<PathBuf, ToolError>;

    /// Rasterise `document` at `density` DPI into the PNG at `image`.
    fn rasterize(&self, document: &Path, density: u32, image: &Path) -> Result<(), ToolError>;
}

/// [`EquationRenderer`] backed by `pdflatex`, `pdfcrop`, and `magick`
/// (or whatever programs the [`Toolchain`] names).
#[derive(Debug, Clone)]
pub struct ExternalToolchain {
    tools: Toolchain,
}

impl ExternalToolchain {
    pub fn new(tools: Toolchain) -> Self {
        Self { tools }
    }

    /// `pdflatex -interaction=nonstopmode -halt-on-error -output-directory=<work> <tex>`
    pub fn typeset_command(&self, tex_file: &Path, work_dir: &Path) -> Command {
        let mut out_dir = OsString::from("-output-directory=");
        out_dir.push(work_dir);

        let mut cmd = Command::new(&self.tools.latex);
        cmd.arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(out_dir)
            .arg(tex_file)
            .current_dir(work_dir);
        cmd
    }

    /// `pdfcrop --margins <m> <pdf> <cropped>`
    pub fn crop_command(&self, cropper: &str, pdf: &Path, cropped: &Path) -> Command {
        let mut cmd = Command::new(cropper);
        cmd.arg("--margins")
            .arg(self.tools.crop_margin.to_string())
            .arg(pdf)
            .arg(cropped);
        cmd
    }

    /// `magick -density <dpi> <pdf>[0] -quality <q> <png>`
    ///
    /// `[0]` selects the first page in case a long equation overflowed.
    pub fn rasterize_command(&self, document: &Path, density: u32, image: &Path) -> Command {
        let mut first_page = document.as_os_str().to_os_string();
        first_page.push("[0]");

        let mut cmd = Command::new(&self.tools.rasterizer);
        cmd.arg("-density")
            .arg(density.to_string())
            .arg(first_page)
            .arg("-quality")
            .arg(self.tools.quality.to_string())
            .arg(image);
        cmd
    }

    fn programs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.tools.latex.as_str())
            .chain(self.tools.cropper.as_deref())
            .chain(std::iter::once(self.tools.rasterizer.as_str()))
    }
}

impl EquationRenderer for ExternalToolchain {
    fn check_available(&self) -> Result<(), ToolError> {
        for program in self.programs() {
            let path = which::which(program).map_err(|_| ToolError::Missing {
                tool: program.to_string(),
            })?;
            debug!("Found {} at {:?}", program, path);
        }
        Ok(())
    }

    fn typeset(&self, tex_file: &Path, work_dir: &Path) -> Result<PathBuf, ToolError> {
        let latex = self.tools.latex.as_str();
        run_tool(latex, self.typeset_command(tex_file, work_dir))?;

        let stem = tex_file.file_stem().unwrap_or_default();
        let pdf = work_dir.join(stem).with_extension("pdf");
        expect_output(latex, &pdf)?;

        let Some(cropper) = self.tools.cropper.as_deref() else {
            return Ok(pdf);
        };

        let mut cropped_name = stem.to_os_string();
        cropped_name.push("-crop.pdf");
        let cropped = work_dir.join(cropped_name);
        run_tool(cropper, self.crop_command(cropper, &pdf, &cropped))?;
        expect_output(cropper, &cropped)?;
        Ok(cropped)
    }

    fn rasterize(&self, document: &Path, density: u32, image: &Path) -> Result<(), ToolError> {
        let rasterizer = self.tools.rasterizer.as_str();
        run_tool(rasterizer, self.rasterize_command(document, density, image))?;
        expect_output(rasterizer, image)
    }
}

/// Run `cmd` to completion with no stdin; non-zero exit is an error.
fn run_tool(tool: &str, mut cmd: Command) -> Result<Output, ToolError> {
    debug!("Running {:?}", cmd);
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ToolError::from_spawn(tool, e))?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            detail: failure_detail(&output.stdout, &output.stderr),
        })
    }
}

fn expect_output(tool: &str, path: &Path) -> Result<(), ToolError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolError::NoOutput {
            tool: tool.to_string(),
            expected: path.to_path_buf(),
        })
    }
}

const MAX_DETAIL_CHARS: usize = 240;

/// Pick the most useful line out of a failed tool's output.
///
/// LaTeX prints its error as a line starting with `!` somewhere in a wall
/// of log text; other tools usually put the reason on the last stderr line.
pub fn failure_detail(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);

    let last_line = |s: &str| {
        s.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(str::to_string)
    };

    let line = stdout
        .lines()
        .chain(stderr.lines())
        .find(|l| l.starts_with('!'))
        .map(|l| l.trim().to_string())
        .or_else(|| last_line(&stderr))
        .or_else(|| last_line(&stdout))
        .unwrap_or_else(|| "no output".to_string());

    if line.chars().count() > MAX_DETAIL_CHARS {
        let cut: String = line.chars().take(MAX_DETAIL_CHARS - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn typeset_command_shape() {
        let chain = ExternalToolchain::new(Toolchain::default());
        let cmd = chain.typeset_command(Path::new("/w/equation.tex"), Path::new("/w"));
        assert_eq!(cmd.get_program(), "pdflatex");
        assert_eq!(
            args(&cmd),
            vec![
                "-interaction=nonstopmode",
                "-halt-on-error",
                "-output-directory=/w",
                "/w/equation.tex",
            ]
        );
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/w")));
    }

    #[test]
    fn crop_command_uses_margin() {
        let chain = ExternalToolchain::new(Toolchain {
            crop_margin: 5,
            ..Toolchain::default()
        });
        let cmd = chain.crop_command("pdfcrop", Path::new("a.pdf"), Path::new("a-crop.pdf"));
        assert_eq!(args(&cmd), vec!["--margins", "5", "a.pdf", "a-crop.pdf"]);
    }

    #[test]
    fn density_only_changes_the_density_argument() {
        let chain = ExternalToolchain::new(Toolchain::default());
        let at_300 = args(&chain.rasterize_command(Path::new("e.pdf"), 300, Path::new("e.png")));
        let at_600 = args(&chain.rasterize_command(Path::new("e.pdf"), 600, Path::new("e.png")));

        assert_eq!(
            at_300,
            vec!["-density", "300", "e.pdf[0]", "-quality", "90", "e.png"]
        );
        let differing: Vec<usize> = (0..at_300.len())
            .filter(|&i| at_300[i] != at_600[i])
            .collect();
        assert_eq!(differing, vec![1]);
        assert_eq!(at_600[1], "600");
    }

    #[test]
    fn custom_rasterizer_program() {
        let chain = ExternalToolchain::new(Toolchain {
            rasterizer: "convert".into(),
            ..Toolchain::default()
        });
        let cmd = chain.rasterize_command(Path::new("e.pdf"), 150, Path::new("e.png"));
        assert_eq!(cmd.get_program(), "convert");
    }

    #[test]
    fn programs_skip_disabled_cropper() {
        let chain = ExternalToolchain::new(Toolchain {
            cropper: None,
            ..Toolchain::default()
        });
        assert_eq!(chain.programs().collect::<Vec<_>>(), vec!["pdflatex", "magick"]);
    }

    #[test]
    fn missing_program_is_reported_as_missing() {
        let chain = ExternalToolchain::new(Toolchain {
            latex: "tex2img-definitely-not-installed".into(),
            ..Toolchain::default()
        });
        let err = chain.check_available().unwrap_err();
        assert!(
            matches!(err, ToolError::Missing { ref tool } if tool == "tex2img-definitely-not-installed"),
            "got: {err:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn installed_programs_pass_the_check() {
        let chain = ExternalToolchain::new(Toolchain {
            latex: "sh".into(),
            cropper: None,
            rasterizer: "/bin/sh".into(),
            ..Toolchain::default()
        });
        chain.check_available().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn missing_cropper_is_reported_even_when_latex_exists() {
        let chain = ExternalToolchain::new(Toolchain {
            latex: "sh".into(),
            cropper: Some("tex2img-no-such-cropper".into()),
            ..Toolchain::default()
        });
        let err = chain.check_available().unwrap_err();
        assert!(
            matches!(err, ToolError::Missing { ref tool } if tool == "tex2img-no-such-cropper"),
            "got: {err:?}"
        );
    }

    #[test]
    fn failure_detail_prefers_latex_error_line() {
        let stdout = b"This is pdfTeX\n(./equation.tex\n! Undefined control sequence.\nl.6 $\\foo\n";
        assert_eq!(
            failure_detail(stdout, b""),
            "! Undefined control sequence."
        );
    }

    #[test]
    fn failure_detail_falls_back_to_last_stderr_line() {
        assert_eq!(
            failure_detail(b"noise", b"magick: unable to open image\n\n"),
            "magick: unable to open image"
        );
        assert_eq!(failure_detail(b"", b""), "no output");
    }

    #[test]
    fn failure_detail_is_truncated() {
        let long = "x".repeat(1000);
        let detail = failure_detail(long.as_bytes(), b"");
        assert_eq!(detail.chars().count(), MAX_DETAIL_CHARS);
        assert!(detail.ends_with('\u{2026}'));
    }
}
