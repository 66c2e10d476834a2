//! Pipeline stages for LaTeX-equation-to-PNG rendering.
//!
//! Each submodule implements exactly one step, so each can be tested on
//! its own and the external tools can be swapped without touching the
//! scanner.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ scan ──▶ document ──▶ toolchain ──▶ place
//! (dir)    (spans)   (.tex)       (pdf → png)   (images/, manifest.json)
//!            ▲
//!        preamble
//! ```
//!
//! 1. [`input`]     validate the source directory
//! 2. [`scan`]      walk `.tex` files and locate block, display and inline math
//! 3. [`preamble`]  harvest `\usepackage` lines and macro definitions per file
//! 4. [`document`]  wrap one equation in a minimal standalone document
//! 5. [`toolchain`] typeset and rasterise via external programs; blocking,
//!    so the orchestrator runs it in `spawn_blocking`
//! 6. [`place`]     move the PNG into the output directory and write the manifest

pub mod document;
pub mod input;
pub mod place;
pub mod preamble;
pub mod scan;
pub mod toolchain;
