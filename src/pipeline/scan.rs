//! Equation scanner: locate math regions in LaTeX sources.
//!
//! ## Why not a regex?
//!
//! `\begin{equation}…\end{equation}` may contain `\begin{aligned}…\end{aligned}`,
//! `$` may be escaped as `\$`, and a `%` comment may hide a stray delimiter.
//! A single regular expression gets every one of those wrong. Instead
//! [`locate`] makes one left-to-right pass over the bytes of a file:
//!
//! * `%` starts a comment running to end of line; nothing inside is a delimiter
//! * `\` escapes the next byte (`\$`, `\%`, `\\`)
//! * `\begin{X}` with X a math environment opens a block; the matching
//!   `\end{X}` is found with a stack of open environment names
//! * `$$` and `\[` open display math, which wins over inline
//! * `$` and `\(` open inline math, which may not cross a blank line
//!
//! Because there is only one pass, regions never overlap: `$x$` inside an
//! `equation` environment belongs to the block, and `$$y$$` is never also
//! two inline spans.
//!
//! All delimiters are ASCII, so byte offsets found by matching them are
//! always `char` boundaries and can be used to slice the source directly.

use crate::config::{EquationKind, EquationKinds, RunConfig};
use crate::error::ScanIssue;
use crate::pipeline::preamble::{self, Preamble};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Environments whose body is display math. Starred forms are accepted too.
pub const MATH_ENVIRONMENTS: &[&str] = &[
    "equation",
    "align",
    "gather",
    "multline",
    "flalign",
    "alignat",
    "eqnarray",
    "displaymath",
];

/// File extensions treated as LaTeX sources (compared case-insensitively).
pub const LATEX_EXTENSIONS: &[&str] = &["tex", "ltx"];

/// `true` for `equation`, `align*`, … but not `aligned`, `cases`, `figure`.
pub fn is_math_environment(name: &str) -> bool {
    let base = name.strip_suffix('*').unwrap_or(name);
    MATH_ENVIRONMENTS.contains(&base)
}

/// One equation found in a source file.
///
/// Immutable once created; the orchestrator consumes each span exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct EquationSpan {
    pub kind: EquationKind,
    /// Exact interior text, without delimiters or environment markers.
    pub raw_text: String,
    pub source_file: PathBuf,
    /// 1-based position in the run's scan order; drives output naming.
    pub ordinal: usize,
    /// 1-based line of the opening delimiter.
    pub line: usize,
    /// Environment name for block spans (`align*`, `gather`, …).
    pub environment: Option<String>,
    /// First `\label{…}` inside the span, `:` replaced by `_`.
    pub label: Option<String>,
    /// Package and macro definitions harvested from the source file.
    #[serde(skip)]
    pub preamble: Arc<Preamble>,
}

// ── Single-file delimiter scan ───────────────────────────────────────────

/// A matched region, as byte offsets into the scanned source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub kind: EquationKind,
    /// Offset of the first byte of the opening delimiter.
    pub opener_offset: usize,
    /// The interior, strictly between the delimiters.
    pub interior: Range<usize>,
    pub environment: Option<String>,
}

/// An opener with no closer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unterminated {
    pub kind: EquationKind,
    pub offset: usize,
    pub opener: String,
}

/// Everything [`locate`] found in one source, each list in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Located {
    pub matches: Vec<RawMatch>,
    pub unterminated: Vec<Unterminated>,
}

/// Scan one LaTeX source for block, display, and inline math regions.
///
/// Every kind is located regardless of what the caller wants; filtering by
/// kind happens afterwards so the regions claimed by one kind are the same
/// whichever kinds were requested.
pub fn locate(source: &str) -> Located {
    let bytes = source.as_bytes();
    let mut out = Located::default();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => i = skip_comment(bytes, i),
            b'\\' => {
                if let Some((env, after)) = environment_tag(bytes, i, b"\\begin") {
                    if is_math_environment(env) {
                        match find_environment_end(bytes, after, env) {
                            Some((end, resume)) => {
                                out.matches.push(RawMatch {
                                    kind: EquationKind::Block,
                                    opener_offset: i,
                                    interior: after..end,
                                    environment: Some(env.to_string()),
                                });
                                i = resume;
                            }
                            None => {
                                out.unterminated.push(Unterminated {
                                    kind: EquationKind::Block,
                                    offset: i,
                                    opener: format!("\\begin{{{env}}}"),
                                });
                                i = after;
                            }
                        }
                    } else {
                        i = after;
                    }
                    continue;
                }

                let (kind, opener, closer) = match bytes.get(i + 1) {
                    Some(b'[') => (EquationKind::Display, "\\[", b']'),
                    Some(b'(') => (EquationKind::Inline, "\\(", b')'),
                    _ => {
                        i += 2;
                        continue;
                    }
                };
                match find_control_close(bytes, i + 2, closer) {
                    Some(close) => {
                        out.matches.push(RawMatch {
                            kind,
                            opener_offset: i,
                            interior: i + 2..close,
                            environment: None,
                        });
                        i = close + 2;
                    }
                    None => {
                        out.unterminated.push(Unterminated {
                            kind,
                            offset: i,
                            opener: opener.to_string(),
                        });
                        i += 2;
                    }
                }
            }
            b'$' if bytes.get(i + 1) == Some(&b'$') => match find_display_close(bytes, i + 2) {
                Some(close) => {
                    out.matches.push(RawMatch {
                        kind: EquationKind::Display,
                        opener_offset: i,
                        interior: i + 2..close,
                        environment: None,
                    });
                    i = close + 2;
                }
                None => {
                    out.unterminated.push(Unterminated {
                        kind: EquationKind::Display,
                        offset: i,
                        opener: "$$".into(),
                    });
                    i += 2;
                }
            },
            b'$' => match find_inline_close(bytes, i + 1) {
                Some(close) => {
                    out.matches.push(RawMatch {
                        kind: EquationKind::Inline,
                        opener_offset: i,
                        interior: i + 1..close,
                        environment: None,
                    });
                    i = close + 1;
                }
                None => {
                    out.unterminated.push(Unterminated {
                        kind: EquationKind::Inline,
                        offset: i,
                        opener: "$".into(),
                    });
                    i += 1;
                }
            },
            _ => i += 1,
        }
    }

    out
}

/// Index of the newline ending the comment that starts at `i` (or EOF).
fn skip_comment(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| i + p)
}

/// Parse `\begin{name}` / `\end{name}` at `i`.
///
/// Returns the name and the offset just past the closing brace.
fn environment_tag<'a>(bytes: &'a [u8], i: usize, tag: &[u8]) -> Option<(&'a str, usize)> {
    if !bytes[i..].starts_with(tag) {
        return None;
    }
    let mut j = i + tag.len();
    // `\beginning` is a different control word.
    if bytes.get(j).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while bytes.get(j).is_some_and(|&b| b == b' ' || b == b'\t') {
        j += 1;
    }
    if bytes.get(j) != Some(&b'{') {
        return None;
    }
    let start = j + 1;
    let mut k = start;
    while bytes
        .get(k)
        .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'*')
    {
        k += 1;
    }
    if k == start || bytes.get(k) != Some(&b'}') {
        return None;
    }
    let name = std::str::from_utf8(&bytes[start..k]).ok()?;
    Some((name, k + 1))
}

/// Find the `\end{env}` closing a block opened just before `from`.
///
/// Returns `(offset of the \end, offset just past it)`. Nested
/// `\begin{…}` of any name push onto a stack; an `\end{…}` matching the top
/// pops it; stray `\end{…}`s are ignored.
fn find_environment_end(bytes: &[u8], from: usize, env: &str) -> Option<(usize, usize)> {
    let mut open: Vec<&str> = Vec::new();
    let mut j = from;

    while j < bytes.len() {
        match bytes[j] {
            b'%' => j = skip_comment(bytes, j),
            b'\\' => {
                if let Some((name, after)) = environment_tag(bytes, j, b"\\begin") {
                    open.push(name);
                    j = after;
                } else if let Some((name, after)) = environment_tag(bytes, j, b"\\end") {
                    if open.last() == Some(&name) {
                        open.pop();
                    } else if open.is_empty() && name == env {
                        return Some((j, after));
                    }
                    j = after;
                } else {
                    j += 2;
                }
            }
            _ => j += 1,
        }
    }
    None
}

/// Offset of the next unescaped `$$`.
fn find_display_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'%' => j = skip_comment(bytes, j),
            b'\\' => j += 2,
            b'$' if bytes.get(j + 1) == Some(&b'$') => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// Offset of the `$` closing an inline span.
///
/// The closer is the next unescaped `$`; if that `$` starts a `$$` pair,
/// or a blank line comes first, the opener is unterminated.
fn find_inline_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'%' => j = skip_comment(bytes, j),
            b'\\' => j += 2,
            b'$' => {
                return (bytes.get(j + 1) != Some(&b'$')).then_some(j);
            }
            b'\n' if is_paragraph_break(bytes, j) => return None,
            _ => j += 1,
        }
    }
    None
}

/// Offset of the `\` in the next `\]` / `\)` (selected by `closer`).
///
/// Like `$`, an inline `\(` may not cross a blank line.
fn find_control_close(bytes: &[u8], from: usize, closer: u8) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'%' => j = skip_comment(bytes, j),
            b'\\' if bytes.get(j + 1) == Some(&closer) => return Some(j),
            b'\\' => j += 2,
            b'\n' if closer == b')' && is_paragraph_break(bytes, j) => return None,
            _ => j += 1,
        }
    }
    None
}

/// `true` when the newline at `i` is followed by a whitespace-only line.
fn is_paragraph_break(bytes: &[u8], i: usize) -> bool {
    bytes[i + 1..]
        .iter()
        .find(|b| !matches!(b, b' ' | b'\t' | b'\r'))
        .is_some_and(|&b| b == b'\n')
}

// ── Span helpers ─────────────────────────────────────────────────────────

/// Maps byte offsets to 1-based line numbers.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    pub fn line(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

static RE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\label\s*\{([^}]*)\}").unwrap());

static RE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9.,]+|\\mathbf\{[0-9.,]+\})$").unwrap());

/// First `\label{…}` in an equation, made safe for file names.
pub fn label_of(interior: &str) -> Option<String> {
    RE_LABEL
        .captures(interior)
        .map(|c| c[1].trim().replace(':', "_"))
        .filter(|l| !l.is_empty())
}

/// `true` for spans not worth an image: blank, fully commented out, or a
/// bare number such as `$3.14$` or `$\mathbf{42}$`.
pub fn is_trivial(interior: &str) -> bool {
    let commented_out = interior
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .all(|l| l.starts_with('%'));
    if commented_out {
        return true;
    }

    let cleaned: String = interior
        .replace("\\\\", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '&')
        .collect();
    RE_NUMERIC.is_match(&cleaned)
}

// ── Directory scanner ────────────────────────────────────────────────────

/// What to extract and how to filter it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub kinds: EquationKinds,
    pub skip_trivial: bool,
    pub inherit_preamble: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            kinds: EquationKinds::all(),
            skip_trivial: true,
            inherit_preamble: true,
        }
    }
}

impl From<&RunConfig> for ScanOptions {
    fn from(c: &RunConfig) -> Self {
        Self {
            kinds: c.kinds,
            skip_trivial: c.skip_trivial,
            inherit_preamble: c.inherit_preamble,
        }
    }
}

pub type ScanItem = Result<EquationSpan, ScanIssue>;

/// Lazy walk over every LaTeX source under a root directory.
///
/// Files are visited depth-first in lexical file-name order, read one at a
/// time, and their spans yielded in source order. Ordinals count up from 1
/// across the whole walk. Recoverable problems come out as `Err` items in
/// the same stream; the walk continues after them.
pub struct Scanner {
    walker: walkdir::IntoIter,
    options: ScanOptions,
    next_ordinal: usize,
    pending: VecDeque<ScanItem>,
    files_scanned: usize,
    skipped: usize,
}

impl Scanner {
    pub fn new(root: impl AsRef<Path>, options: ScanOptions) -> Self {
        Self {
            walker: WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter(),
            options,
            next_ordinal: 1,
            pending: VecDeque::new(),
            files_scanned: 0,
            skipped: 0,
        }
    }

    /// LaTeX files opened so far.
    pub fn files_scanned(&self) -> usize {
        self.files_scanned
    }

    /// Spans dropped by the trivial-content filter so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn scan_file(&mut self, path: &Path) {
        self.files_scanned += 1;

        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", path.display(), e);
                self.pending.push_back(Err(ScanIssue::Unreadable {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                }));
                return;
            }
        };

        let located = locate(&source);
        let lines = LineIndex::new(&source);
        let preamble = Arc::new(if self.options.inherit_preamble {
            preamble::harvest(&source)
        } else {
            Preamble::default()
        });

        let mut events: Vec<(usize, ScanItem)> = Vec::new();

        for open in located.unterminated {
            if !self.options.kinds.contains(open.kind) {
                continue;
            }
            let issue = ScanIssue::Unterminated {
                file: path.to_path_buf(),
                line: lines.line(open.offset),
                kind: open.kind,
                opener: open.opener,
            };
            warn!("{issue}");
            events.push((open.offset, Err(issue)));
        }

        for m in located.matches {
            if !self.options.kinds.contains(m.kind) {
                continue;
            }
            let interior = &source[m.interior.clone()];
            let line = lines.line(m.opener_offset);
            if self.options.skip_trivial && is_trivial(interior) {
                debug!(
                    "Skipping trivial {} span at {}:{}",
                    m.kind,
                    path.display(),
                    line
                );
                self.skipped += 1;
                continue;
            }
            events.push((
                m.opener_offset,
                Ok(EquationSpan {
                    kind: m.kind,
                    raw_text: interior.to_string(),
                    source_file: path.to_path_buf(),
                    ordinal: 0,
                    line,
                    environment: m.environment,
                    label: label_of(interior),
                    preamble: Arc::clone(&preamble),
                }),
            ));
        }

        events.sort_by_key(|(offset, _)| *offset);
        for (_, mut item) in events {
            if let Ok(span) = &mut item {
                span.ordinal = self.next_ordinal;
                self.next_ordinal += 1;
            }
            self.pending.push_back(item);
        }

        debug!("Scanned {}", path.display());
    }
}

impl Iterator for Scanner {
    type Item = ScanItem;

    fn next(&mut self) -> Option<ScanItem> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!("Skipping unreadable entry {}: {}", path.display(), e);
                    return Some(Err(ScanIssue::Unreadable {
                        path,
                        detail: e.to_string(),
                    }));
                }
            };

            if entry.file_type().is_file() && is_latex_source(entry.path()) {
                self.scan_file(entry.path());
            }
        }
    }
}

/// `true` for `*.tex` / `*.ltx`, any case.
pub fn is_latex_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            LATEX_EXTENSIONS
                .iter()
                .any(|want| e.eq_ignore_ascii_case(want))
        })
}
