//! Progress-callback trait for per-page OCR events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while the orchestrator recognises pages. Only pages that actually
//! go through OCR in a run produce page events; pages carried over from the
//! previous conversion are silent.
//!
//! # Example
//!
//! ```rust
//! use snote_convert::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, _page_id: &str, _done: usize, _total: usize, _texts: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it recognises pages.
///
/// OCR runs concurrently, so `on_page_start`, `on_page_complete` and
/// `on_page_error` may arrive from several tasks at once and out of page
/// order. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any page is recognised.
    ///
    /// # Arguments
    /// * `total_pages`: pages that will go through OCR in this run
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is sent to the OCR engine.
    fn on_page_start(&self, page_id: &str, total_pages: usize) {
        let _ = (page_id, total_pages);
    }

    /// Called when a page has been recognised.
    ///
    /// # Arguments
    /// * `page_id`:     id of the page
    /// * `done`:        pages finished so far, including this one
    /// * `total_pages`: pages that go through OCR in this run
    /// * `text_count`:  texts kept after the confidence filter
    fn on_page_complete(&self, page_id: &str, done: usize, total_pages: usize, text_count: usize) {
        let _ = (page_id, done, total_pages, text_count);
    }

    /// Called when OCR fails for a page. The run is abandoned afterwards.
    fn on_page_error(&self, page_id: &str, error: &str) {
        let _ = (page_id, error);
    }

    /// Called once after every page has been recognised.
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
