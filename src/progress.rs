//! Progress-callback trait for per-equation render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the orchestrator works through the scanned equations.
//!
//! # Example
//!
//! ```rust
//! use tex2img::{RenderProgressCallback, RunConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_equation_complete(&self, ordinal: usize, total: usize, image: &Path) {
//!         let done = self.rendered.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{ordinal}/{total} → {} ({done} so far)", image.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//!
//! let config = RunConfig::builder("paper/")
//!     .progress_callback(counter as Arc<dyn RenderProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as it renders each equation.
///
/// Equations are processed one at a time, but implementations must still be
/// `Send + Sync`: the config holding the callback crosses into
/// `spawn_blocking` tasks. All methods have default no-op implementations
/// so callers only override what they care about.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once after scanning, before any equation is rendered.
    ///
    /// # Arguments
    /// * `total`: number of equations that will be rendered
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before an equation enters the typeset step.
    fn on_equation_start(&self, ordinal: usize, total: usize) {
        let _ = (ordinal, total);
    }

    /// Called when an equation's image is in place.
    ///
    /// # Arguments
    /// * `ordinal`: 1-based sequence number of the equation
    /// * `total`: number of equations in the run
    /// * `image`: final path of the PNG
    fn on_equation_complete(&self, ordinal: usize, total: usize, image: &Path) {
        let _ = (ordinal, total, image);
    }

    /// Called when an equation fails to render.
    fn on_equation_error(&self, ordinal: usize, total: usize, error: &str) {
        let _ = (ordinal, total, error);
    }

    /// Called once after every equation has been attempted.
    ///
    /// # Arguments
    /// * `total`: number of equations attempted
    /// * `rendered`: equations that produced an image
    fn on_run_complete(&self, total: usize, rendered: usize) {
        let _ = (total, rendered);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        run_total: AtomicUsize,
        rendered_total: AtomicUsize,
    }

    impl RenderProgressCallback for TrackingCallback {
        fn on_run_start(&self, total: usize) {
            self.run_total.store(total, Ordering::SeqCst);
        }

        fn on_equation_start(&self, _ordinal: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_equation_complete(&self, _ordinal: usize, _total: usize, _image: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_equation_error(&self, _ordinal: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total: usize, rendered: usize) {
            self.rendered_total.store(rendered, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_equation_start(1, 2);
        cb.on_equation_complete(1, 2, Path::new("images/inline_1.png"));
        cb.on_equation_error(2, 2, "pdflatex exited with 1");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_run_start(3);
        tracker.on_equation_start(1, 3);
        tracker.on_equation_complete(1, 3, Path::new("block_1.png"));
        tracker.on_equation_start(2, 3);
        tracker.on_equation_complete(2, 3, Path::new("inline_2.png"));
        tracker.on_equation_start(3, 3);
        tracker.on_equation_error(3, 3, "Undefined control sequence");
        tracker.on_run_complete(3, 2);

        assert_eq!(tracker.run_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.rendered_total.load(Ordering::SeqCst), 2);
    }
}
