//! Progress-callback trait for per-paragraph rewrite events.
//!
//! Inject an [`Arc<dyn RewriteProgressCallback>`] via
//! [`crate::config::RewriterConfigBuilder::progress_callback`] to receive
//! events as the rewriter walks the petition.
//!
//! # Example
//!
//! ```rust
//! use edgequake_petition::{RewriteProgressCallback, RewriterConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl RewriteProgressCallback for CountingCallback {
//!     fn on_paragraph_complete(&self, index: usize, total: usize, text_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("paragraph {index} ({done}/{total}), {text_len} bytes");
//!     }
//! }
//!
//! let config = RewriterConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the rewriter as it processes each body paragraph.
///
/// Section markers and blank lines never reach the model and produce no
/// events. `index` is the 0-based position in the input sequence; `total` is
/// the number of body paragraphs. All methods default to no-ops.
pub trait RewriteProgressCallback: Send + Sync {
    /// Called once before the first paragraph.
    fn on_rewrite_start(&self, total_body_paragraphs: usize) {
        let _ = total_body_paragraphs;
    }

    /// Called just before the completion request for a body paragraph.
    fn on_paragraph_start(&self, index: usize, total: usize, section: &str) {
        let _ = (index, total, section);
    }

    /// Called when a body paragraph was rewritten by the model.
    fn on_paragraph_complete(&self, index: usize, total: usize, text_len: usize) {
        let _ = (index, total, text_len);
    }

    /// Called when a body paragraph fell back to the degraded marker text.
    fn on_paragraph_degraded(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every paragraph has been attempted.
    fn on_rewrite_complete(&self, total: usize, rewritten: usize, total_cost_usd: f64) {
        let _ = (total, rewritten, total_cost_usd);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RewriteProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RewriterConfig`].
pub type ProgressCallback = Arc<dyn RewriteProgressCallback>;
