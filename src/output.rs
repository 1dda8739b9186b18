//! Result types returned by the conversion entry points.
//!
//! Every item gets exactly one [`PageResult`], in item-list order, whether it
//! became a page or not. The written document contains the successful ones
//! in that same order.

use crate::error::{ConvertError, PageError};
use crate::pipeline::archive::ArchiveOutcome;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one item.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    /// 0-based position in the ordered item list.
    pub index: usize,
    pub name: String,
    /// Page size in points; zero when the item failed.
    pub width_pt: f32,
    pub height_pt: f32,
    /// Set when the item was skipped.
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Images found.
    pub total_pages: usize,
    /// Images that became pages.
    pub processed_pages: usize,
    /// Images skipped because of a [`PageError`].
    pub failed_pages: usize,
    pub total_duration_ms: u64,
    /// Time spent inside the worker pool.
    pub transform_duration_ms: u64,
}

/// Everything produced by converting one unit.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Name of the unit (usually the collection directory name).
    pub unit: String,
    /// Where the PDF was written. It may since have been removed by archival.
    pub document: PathBuf,
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
    /// Present when the document was archived.
    pub archive: Option<ArchiveOutcome>,
}

impl ConversionOutput {
    /// Turn any page failure into [`ConvertError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, ConvertError> {
        if self.stats.failed_pages > 0 {
            Err(ConvertError::PartialFailure {
                unit: self.unit,
                success: self.stats.processed_pages,
                failed: self.stats.failed_pages,
                total: self.stats.total_pages,
            })
        } else {
            Ok(self)
        }
    }

    /// Errors of the skipped items, in item order.
    pub fn page_errors(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }
}
