//! Conversion entry points: ordered parallel pipeline for one unit of work.
//!
//! ## Ordering
//!
//! Items are submitted as `(index, item)` pairs to a pool of at most
//! `concurrency` workers. Workers finish in any order; every report lands in
//! the slot addressed by its index, and nothing is assembled until all slots
//! are filled. Page order therefore depends only on the ordered item list.
//!
//! ## Failure policy
//!
//! An image that cannot be read or decoded is recorded and left out of the
//! document; the other workers are never cancelled. A unit fails only when
//! no page at all could be produced (or, in strict mode, when any failed).

use crate::config::ConversionConfig;
use crate::error::{ConvertError, PageError};
use crate::output::{ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::{archive, assemble, input, page};
use crate::pipeline::input::Item;
use crate::pipeline::page::PageArtifact;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert every image under `input_dir` into one PDF at `output_path`.
///
/// The unit is named after the directory. Archives the PDF afterwards when
/// [`ConversionConfig::encrypt_output`] is set.
///
/// # Errors
/// Returns `Err(ConvertError)` only for unit-level failures:
/// - directory missing or unreadable
/// - no image could be converted
/// - the document or archive could not be written
pub async fn convert_dir(
    input_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let input_dir = input_dir.as_ref();
    let unit = input_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_dir.display().to_string());

    let dir = input_dir.to_path_buf();
    let items = tokio::task::spawn_blocking(move || input::list_images(&dir))
        .await
        .map_err(|e| ConvertError::Internal(format!("Listing task panicked: {}", e)))??;

    convert_items(&unit, items, output_path, config).await
}

/// Convert an already ordered item list into one PDF at `output_path`.
///
/// The items are used in the order given; sort them with
/// [`crate::NaturalKey`] first if they come from an unordered source.
pub async fn convert_items(
    unit: &str,
    items: Vec<Item>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let total_start = Instant::now();
    let output_path = output_path.as_ref().to_path_buf();
    let total = items.len();
    info!(
        "Converting '{}': {} images at {}, {} workers",
        unit, total, config.fidelity, config.concurrency
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(unit, total);
    }

    // ── Step 1: Transform (join barrier) ─────────────────────────────────
    let transform_start = Instant::now();
    let slots = transform_concurrent(items, config).await?;
    let transform_duration_ms = transform_start.elapsed().as_millis() as u64;

    // ── Step 2: Split reports, in index order ────────────────────────────
    let mut pages = Vec::with_capacity(total);
    let mut artifacts: Vec<PageArtifact> = Vec::with_capacity(total);
    for slot in slots {
        match slot {
            Ok(artifact) => {
                pages.push(PageResult {
                    index: artifact.index,
                    name: artifact.name.clone(),
                    width_pt: artifact.width_pt,
                    height_pt: artifact.height_pt,
                    error: None,
                });
                artifacts.push(artifact);
            }
            Err(e) => {
                warn!("Skipping {}", e);
                pages.push(PageResult {
                    index: e.index(),
                    name: e.name().to_string(),
                    width_pt: 0.0,
                    height_pt: 0.0,
                    error: Some(e),
                });
            }
        }
    }

    let processed = artifacts.len();
    let failed = total - processed;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(unit, total, processed);
    }

    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no images found".to_string());
        return Err(ConvertError::EmptyDocument {
            unit: unit.to_string(),
            total,
            failed,
            first_error,
        });
    }

    if config.strict && failed > 0 {
        return Err(ConvertError::PartialFailure {
            unit: unit.to_string(),
            success: processed,
            failed,
            total,
        });
    }

    // ── Step 3: Assemble and persist ─────────────────────────────────────
    let title = unit.to_string();
    let path = output_path.clone();
    let document = tokio::task::spawn_blocking(move || {
        assemble::assemble_document(&artifacts, &path, Some(&title))
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Assembly task panicked: {}", e)))??;

    // ── Step 4: Optional archival ────────────────────────────────────────
    let archive = if config.encrypt_output {
        let doc = document.clone();
        let delete = config.delete_plaintext;
        let outcome = tokio::task::spawn_blocking(move || archive::archive_document(&doc, delete))
            .await
            .map_err(|e| ConvertError::Internal(format!("Archive task panicked: {}", e)))??;
        Some(outcome)
    } else {
        None
    };

    let stats = ConversionStats {
        total_pages: total,
        processed_pages: processed,
        failed_pages: failed,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        transform_duration_ms,
    };

    info!(
        "Converted '{}': {}/{} pages, {}ms total",
        unit, processed, total, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        unit: unit.to_string(),
        document,
        pages,
        stats,
        archive,
    })
}

/// Synchronous wrapper around [`convert_dir`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_dir(input_dir, output_path, config))
}

/// `<parent>/<unit>.pdf`.
pub fn document_path(parent: &Path, unit: &str) -> PathBuf {
    parent.join(format!("{unit}.pdf"))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run the transformer over every item with bounded concurrency.
///
/// Returns one report per item, addressed by index.
async fn transform_concurrent(
    items: Vec<Item>,
    config: &ConversionConfig,
) -> Result<Vec<Result<PageArtifact, PageError>>, ConvertError> {
    let total = items.len();
    let fidelity = config.fidelity;
    let quality = config.jpeg_quality;

    let reports: Vec<(usize, Result<PageArtifact, PageError>)> =
        stream::iter(items.into_iter().enumerate().map(|(index, item)| {
            let cb = config.progress_callback.clone();
            async move {
                let page_num = index + 1;
                if let Some(ref cb) = cb {
                    cb.on_page_start(page_num, total);
                }

                let name = item.name.clone();
                let result = tokio::task::spawn_blocking(move || {
                    page::transform_item(index, item, fidelity, quality)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(PageError::DecodeFailed {
                        index,
                        name,
                        detail: format!("worker panicked: {e}"),
                    })
                });

                if let Some(ref cb) = cb {
                    match &result {
                        Ok(artifact) => cb.on_page_complete(page_num, total, &artifact.name),
                        Err(e) => cb.on_page_error(page_num, total, &e.to_string()),
                    }
                }
                (index, result)
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut slots: Vec<Option<Result<PageArtifact, PageError>>> =
        (0..total).map(|_| None).collect();
    for (index, result) in reports {
        debug!("Image #{} reported ({})", index, if result.is_ok() { "ok" } else { "failed" });
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| ConvertError::Internal(format!("image #{index} never reported")))
        })
        .collect()
}
