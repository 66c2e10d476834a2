//! CLI binary for tex2img.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RunConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tex2img::{
    render_directory, scan_directory, EquationKind, EquationKinds, ProgressCallback,
    RenderProgressCallback, RunConfig, ScanReport, Toolchain,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

/// Shorten `s` to `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a live bar plus one log line per equation.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the equation currently rendering.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many equations there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Looking for equations…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} equations  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total} equations…"))
        ));
    }

    fn on_equation_start(&self, ordinal: usize, _total: usize) {
        *self.started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("equation #{ordinal}"));
    }

    fn on_equation_complete(&self, ordinal: usize, total: usize, image: &Path) {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} #{:>4}/{:<4}  {:<18}  {}",
            green("✓"),
            ordinal,
            total,
            name,
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_equation_error(&self, ordinal: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} #{:>4}/{:<4}  {}  {}",
            red("✗"),
            ordinal,
            total,
            red(&truncate(error, 100)),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _total: usize, _rendered: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every equation under paper/ into ./images
  tex2img paper/

  # Only numbered environments, at print resolution
  tex2img paper/ -t block -d 600 -o figures/eq

  # Display and inline math together
  tex2img paper/ -t display inline

  # See what would be rendered, without any TeX install
  tex2img paper/ --list-only

  # Machine-readable results
  tex2img paper/ --json > run.json

OUTPUT:
  <output-dir>/<kind>_<ordinal>.png   one image per equation, e.g. inline_4.png
  <output-dir>/manifest.json          ordinal, kind, source file, line, label, image
                                      size or error for every equation

  Ordinals count from 1 in scan order: files in name order, equations in
  source order within a file.

EXTERNAL TOOLS:
  pdflatex    typesets each equation (TeX Live, MiKTeX)
  pdfcrop     trims the page to the equation (skip with --no-crop)
  magick      rasterises the PDF (ImageMagick 7; use --rasterizer convert on 6)

ENVIRONMENT VARIABLES:
  RUST_LOG    Override the log filter, e.g. RUST_LOG=tex2img=debug
"#;

/// Render the equations in a tree of LaTeX sources to PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "tex2img",
    version,
    about = "Render the equations in LaTeX sources to PNG images",
    long_about = "Scan a directory of LaTeX sources for block environments \
(\\begin{equation}…), display math ($$…$$, \\[…\\]) and inline math ($…$), then \
render each equation on its own through pdflatex and ImageMagick.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing .tex / .ltx files (searched recursively).
    input_dir: PathBuf,

    /// Directory the images are written to.
    #[arg(short, long, default_value = "images")]
    output_dir: PathBuf,

    /// Equation types to extract: all, block, display, inline.
    #[arg(
        short = 't',
        long,
        value_enum,
        num_args = 1..,
        value_delimiter = ',',
        default_value = "all"
    )]
    equation_types: Vec<TypeArg>,

    /// Rasterisation density in DPI.
    #[arg(short, long, default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(1..))]
    density: u32,

    /// LaTeX engine used to typeset each equation.
    #[arg(long, default_value = "pdflatex")]
    latex: String,

    /// PDF cropper run after typesetting.
    #[arg(long, default_value = "pdfcrop")]
    cropper: String,

    /// Skip cropping; images are then full pages.
    #[arg(long)]
    no_crop: bool,

    /// Margin in points left around the cropped equation.
    #[arg(long, default_value_t = 3)]
    crop_margin: u32,

    /// Program that rasterises the PDF to PNG.
    #[arg(long, default_value = "magick")]
    rasterizer: String,

    /// Also render whitespace-only and purely numeric spans.
    #[arg(long)]
    keep_trivial: bool,

    /// Do not copy \usepackage lines and macro definitions from the source file.
    #[arg(long)]
    no_preamble: bool,

    /// Do not write manifest.json.
    #[arg(long)]
    no_manifest: bool,

    /// Scan and list the equations found; render nothing.
    #[arg(long)]
    list_only: bool,

    /// Print structured JSON (RunOutput / ScanReport) to stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TypeArg {
    All,
    Block,
    Display,
    Inline,
}

/// Union of the requested types; `all` anywhere selects everything.
fn kinds_from_args(types: &[TypeArg]) -> EquationKinds {
    if types.contains(&TypeArg::All) {
        return EquationKinds::all();
    }
    types
        .iter()
        .filter_map(|t| match t {
            TypeArg::All => None,
            TypeArg::Block => Some(EquationKind::Block),
            TypeArg::Display => Some(EquationKind::Display),
            TypeArg::Inline => Some(EquationKind::Inline),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list_only {
        let config = build_config(&cli, None)?;
        let report = scan_directory(&config)
            .await
            .context("Failed to scan input directory")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise scan report")?
            );
        } else {
            print_listing(&report);
            if !cli.quiet {
                if report.spans.is_empty() {
                    eprintln!(
                        "{} no equations found under {}",
                        cyan("⚠"),
                        cli.input_dir.display()
                    );
                }
                eprintln!(
                    "{} equations in {} files  {}",
                    bold(&report.spans.len().to_string()),
                    report.files_scanned,
                    dim(&format!(
                        "({} skipped, {} warnings)",
                        report.skipped,
                        report.warnings.len()
                    )),
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RenderProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = render_directory(&config)
        .await
        .context("Rendering failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if cli.quiet {
        return Ok(());
    }

    // Scan warnings were logged below the active filter while the bar ran.
    if show_progress {
        for warning in &output.warnings {
            eprintln!("{} {}", cyan("⚠"), warning);
        }
    }

    let stats = &output.stats;
    if stats.found == 0 {
        eprintln!(
            "{} no equations found under {}",
            cyan("⚠"),
            cli.input_dir.display()
        );
    }

    let mark = if stats.failed == 0 {
        green("✔")
    } else if stats.rendered == 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {}  {}  →  {}",
        mark,
        stats,
        dim(&format!("{}ms", stats.duration_ms)),
        bold(&config.output_dir.display().to_string()),
    );

    Ok(())
}

/// Map CLI args to `RunConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RunConfig> {
    let toolchain = Toolchain {
        latex: cli.latex.clone(),
        cropper: (!cli.no_crop).then(|| cli.cropper.clone()),
        crop_margin: cli.crop_margin,
        rasterizer: cli.rasterizer.clone(),
        ..Toolchain::default()
    };

    let mut builder = RunConfig::builder(&cli.input_dir)
        .output_dir(&cli.output_dir)
        .kinds(kinds_from_args(&cli.equation_types))
        .density(cli.density)
        .toolchain(toolchain)
        .skip_trivial(!cli.keep_trivial)
        .inherit_preamble(!cli.no_preamble)
        .write_manifest(!cli.no_manifest);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// One line per span: ordinal, kind, location, and a preview of the source.
fn print_listing(report: &ScanReport) {
    for span in &report.spans {
        let preview = span.raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
        println!(
            "{:>4}  {:<7}  {}:{}  {}",
            span.ordinal,
            span.kind,
            span.source_file.display(),
            span.line,
            truncate(&preview, 60),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["tex2img", "paper"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("images"));
        assert_eq!(config.kinds, EquationKinds::all());
        assert_eq!(config.density, 300);
        assert_eq!(config.toolchain, Toolchain::default());
    }

    #[test]
    fn multiple_types_are_a_union() {
        let cli = Cli::try_parse_from(["tex2img", "paper", "-t", "display", "inline"]).unwrap();
        let kinds = kinds_from_args(&cli.equation_types);
        assert!(!kinds.contains(EquationKind::Block));
        assert!(kinds.contains(EquationKind::Display));
        assert!(kinds.contains(EquationKind::Inline));

        let cli = Cli::try_parse_from(["tex2img", "paper", "-t", "block,all"]).unwrap();
        assert_eq!(kinds_from_args(&cli.equation_types), EquationKinds::all());
    }

    #[test]
    fn zero_density_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["tex2img", "paper", "-d", "0"]).is_err());
        assert!(Cli::try_parse_from(["tex2img", "paper", "-t", "matrix"]).is_err());
    }

    #[test]
    fn no_crop_disables_cropper() {
        let cli = Cli::try_parse_from(["tex2img", "paper", "--no-crop"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.toolchain.cropper, None);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("αβγδ", 3), "αβ\u{2026}");
        assert_eq!(truncate("short", 10), "short");
    }
}
