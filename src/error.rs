//! Error types for the album2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] is **fatal for one unit of work**: a directory cannot be
//!   turned into a document at all (every image failed, the output could not
//!   be written, the archive could not be created). Returned as
//!   `Err(ConvertError)` from the `convert*` functions and recorded, not
//!   raised, by the batch orchestrator.
//!
//! * [`PageError`] is **non-fatal**: a single image failed to read or decode
//!   but the other pages are fine. Stored inside
//!   [`crate::output::PageResult`] so callers can inspect partial success
//!   rather than losing the whole document to one bad file.

use std::path::PathBuf;
use thiserror::Error;

/// All unit-level errors returned by the album2pdf library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The image directory does not exist or is not a directory.
    #[error("Image directory not found: '{path}'")]
    DirectoryNotFound { path: PathBuf },

    /// Walking the image directory failed part-way.
    #[error("Failed to list images under '{path}': {detail}")]
    ListingFailed { path: PathBuf, detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// No page could be produced; writing a document would be pointless.
    #[error("No pages produced for '{unit}': {failed}/{total} images failed.\nFirst error: {first_error}")]
    EmptyDocument {
        unit: String,
        total: usize,
        failed: usize,
        first_error: String,
    },

    /// Some pages failed and the caller asked for strict conversion.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] and by
    /// the pipeline when [`crate::config::ConversionConfig::strict`] is set.
    #[error("{failed}/{total} pages failed while converting '{unit}'")]
    PartialFailure {
        unit: String,
        success: usize,
        failed: usize,
        total: usize,
    },

    /// The single-page payloads could not be merged into one document.
    #[error("Failed to assemble document '{path}': {detail}")]
    AssemblyFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write document '{path}': {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the encrypted archive. The plaintext is untouched.
    #[error("Failed to archive '{path}': {detail}\nThe original document was left in place.")]
    ArchiveFailed { path: PathBuf, detail: String },

    // ── Acquisition errors ────────────────────────────────────────────────
    /// The external acquisition step failed for a collection.
    #[error("Failed to acquire collection '{collection}': {detail}")]
    AcquisitionFailed { collection: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (worker panic, runtime creation).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
/// The overall conversion continues unless ALL pages fail.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The image file could not be read from disk.
    #[error("Image #{index} '{name}': read failed: {detail}")]
    ReadFailed {
        index: usize,
        name: String,
        detail: String,
    },

    /// The bytes are not a decodable JPEG/PNG image.
    #[error("Image #{index} '{name}': decode failed: {detail}")]
    DecodeFailed {
        index: usize,
        name: String,
        detail: String,
    },

    /// The image decoded but the page could not be built.
    #[error("Image #{index} '{name}': page encoding failed: {detail}")]
    EncodeFailed {
        index: usize,
        name: String,
        detail: String,
    },
}

impl PageError {
    /// Index of the offending item in the ordered item list.
    pub fn index(&self) -> usize {
        match self {
            PageError::ReadFailed { index, .. }
            | PageError::DecodeFailed { index, .. }
            | PageError::EncodeFailed { index, .. } => *index,
        }
    }

    /// Name of the offending item, relative to its collection directory.
    pub fn name(&self) -> &str {
        match self {
            PageError::ReadFailed { name, .. }
            | PageError::DecodeFailed { name, .. }
            | PageError::EncodeFailed { name, .. } => name,
        }
    }
}
