//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline transforms each image.
//!
//! # Example
//!
//! ```rust
//! use album2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, name: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({})", page_num, total_pages, name);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each image.
///
/// Implementations must be `Send + Sync`: page events fire from whichever
/// worker finishes, in completion order rather than page order. All methods
/// have default no-op implementations so callers only override what they
/// care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once per unit before any image is transformed.
    ///
    /// # Arguments
    /// * `unit`: name of the document being built
    /// * `total_pages`: number of images that will be processed
    fn on_conversion_start(&self, unit: &str, total_pages: usize) {
        let _ = (unit, total_pages);
    }

    /// Called when a worker picks up an image.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed position in the ordered item list
    /// * `total_pages`: total images in the unit
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when an image becomes a page.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, name: &str) {
        let _ = (page_num, total_pages, name);
    }

    /// Called when an image could not be turned into a page.
    ///
    /// # Arguments
    /// * `error`: human-readable error description naming the image
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once per unit after every image has reported.
    ///
    /// # Arguments
    /// * `total_pages`: images attempted
    /// * `success_count`: images that became pages
    fn on_conversion_complete(&self, unit: &str, total_pages: usize, success_count: usize) {
        let _ = (unit, total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
