//! Batch orchestration over a base directory.
//!
//! A batch has two phases. First every requested collection is acquired
//! through a [`CollectionSource`]; a failed acquisition is recorded and the
//! batch moves on. Then every immediate subdirectory of the base directory is
//! converted, in natural order, into `<base>/<name>.pdf` (and archived when
//! configured). Units that already have their final output are skipped, so
//! re-running a batch only does the work that is still missing.
//!
//! Unit failures never abort the batch: they end up in the [`BatchReport`].

use crate::config::{BatchConfig, ConversionConfig};
use crate::convert::{convert_dir, document_path};
use crate::error::ConvertError;
use crate::output::ConversionOutput;
use crate::pipeline::archive::archive_path_for;
use crate::pipeline::order::NaturalKey;
use crate::source::CollectionSource;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of acquiring one collection.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub collection_id: String,
    /// Set when acquisition failed.
    pub error: Option<String>,
}

/// What happened to one subdirectory of the base directory.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Converted(ConversionOutput),
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub name: String,
    #[serde(flatten)]
    pub status: UnitStatus,
}

/// Structured result of [`run_batch`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub acquisitions: Vec<AcquisitionReport>,
    pub units: Vec<UnitReport>,
    pub total_duration_ms: u64,
}

impl BatchReport {
    pub fn converted(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Converted(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Failed { .. }))
    }

    pub fn failed_acquisitions(&self) -> usize {
        self.acquisitions.iter().filter(|a| a.error.is_some()).count()
    }

    /// True when no acquisition or unit failed.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.failed_acquisitions() == 0
    }

    fn count(&self, pred: impl Fn(&UnitStatus) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.status)).count()
    }
}

/// Acquire every collection in `batch`, then convert every unit under the
/// base directory.
///
/// # Errors
/// Only when the base directory itself cannot be listed. Everything else is
/// recorded in the returned report.
pub async fn run_batch(
    batch: &BatchConfig,
    config: &ConversionConfig,
    source: &dyn CollectionSource,
) -> Result<BatchReport, ConvertError> {
    let start = Instant::now();
    let base = batch.base_dir.as_path();
    let mut report = BatchReport::default();

    // ── Phase 1: acquisition ─────────────────────────────────────────────
    for id in &batch.collection_ids {
        info!("Acquiring collection '{}'", id);
        let error = match source.acquire(id, base).await {
            Ok(()) => None,
            Err(e) => {
                error!("{}", e);
                Some(e.to_string())
            }
        };
        report.acquisitions.push(AcquisitionReport {
            collection_id: id.clone(),
            error,
        });
    }

    // ── Phase 2: conversion ──────────────────────────────────────────────
    let units = list_units(base).await?;
    info!("{} units under {}", units.len(), base.display());

    for (name, dir) in units {
        let status = convert_unit(base, &name, &dir, config).await;
        report.units.push(UnitReport { name, status });
    }

    report.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Batch finished: {} converted, {} skipped, {} failed in {}ms",
        report.converted(),
        report.skipped(),
        report.failed(),
        report.total_duration_ms
    );
    Ok(report)
}

async fn convert_unit(base: &Path, name: &str, dir: &Path, config: &ConversionConfig) -> UnitStatus {
    if let Some(reason) = skip_reason(base, name, config) {
        info!("Skipping '{}': {}", name, reason);
        return UnitStatus::Skipped { reason };
    }

    let document = document_path(base, name);
    match convert_dir(dir, &document, config).await {
        Ok(output) => UnitStatus::Converted(output),
        Err(e) => {
            error!("{}", e);
            UnitStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Why `name` needs no work, if it doesn't.
///
/// An existing archive always means done. Without encryption an existing
/// plain `<name>.pdf` counts as done too, so a unit whose images changed is
/// not rebuilt until its document is removed. With encryption on, a stray
/// plain document is rebuilt and archived.
fn skip_reason(base: &Path, name: &str, config: &ConversionConfig) -> Option<String> {
    let document = document_path(base, name);
    let archive = archive_path_for(&document);
    if archive.exists() {
        return Some(format!("archive {} already exists", archive.display()));
    }
    if !config.encrypt_output && document.exists() {
        return Some(format!("document {} already exists", document.display()));
    }
    None
}

/// Immediate subdirectories of `base`, naturally ordered by name.
async fn list_units(base: &Path) -> Result<Vec<(String, PathBuf)>, ConvertError> {
    let listing_err = |e: std::io::Error| ConvertError::ListingFailed {
        path: base.to_path_buf(),
        detail: e.to_string(),
    };

    if !tokio::fs::metadata(base)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(ConvertError::DirectoryNotFound {
            path: base.to_path_buf(),
        });
    }

    let mut entries = tokio::fs::read_dir(base).await.map_err(listing_err)?;
    let mut units = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(listing_err)? {
        let path = entry.path();
        // metadata() follows symlinks, file_type() does not.
        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => units.push((name, path)),
            Err(raw) => warn!("Ignoring non UTF-8 directory name {:?}", raw),
        }
    }

    units.sort_by_cached_key(|(name, _)| NaturalKey::new(name));
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LocalSource;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::fs;

    fn write_png(path: &Path, width: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 16, Rgb([1, 2, 3])))
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    #[tokio::test]
    async fn units_are_listed_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["vol10", "vol2", "vol1"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let names: Vec<String> = list_units(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, ["vol1", "vol2", "vol10"]);
    }

    #[test]
    fn skip_rules_depend_on_encryption() {
        let dir = tempfile::tempdir().unwrap();
        let plain = ConversionConfig::default();
        let encrypted = ConversionConfig::builder().encrypt_output(true).build().unwrap();

        assert!(skip_reason(dir.path(), "a", &plain).is_none());

        fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        assert!(skip_reason(dir.path(), "a", &plain).is_some());
        assert!(skip_reason(dir.path(), "a", &encrypted).is_none());

        fs::write(dir.path().join("a.pdf.zip"), b"PK").unwrap();
        assert!(skip_reason(dir.path(), "a", &encrypted).is_some());
    }

    #[tokio::test]
    async fn failing_unit_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("good/1.png"), 20);
        fs::create_dir(dir.path().join("empty")).unwrap();

        let batch = BatchConfig::new(dir.path());
        let report = run_batch(&batch, &ConversionConfig::default(), &LocalSource)
            .await
            .unwrap();

        assert_eq!(report.units.len(), 2);
        assert_eq!(report.converted(), 1);
        assert_eq!(report.failed(), 1);
        assert!(dir.path().join("good.pdf").exists());
        assert!(!dir.path().join("empty.pdf").exists());
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn missing_base_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let batch = BatchConfig::new(dir.path().join("missing"));
        let err = run_batch(&batch, &ConversionConfig::default(), &LocalSource)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::DirectoryNotFound { .. }));
    }

    #[test]
    fn report_serialises_with_status_tag() {
        let report = BatchReport {
            units: vec![UnitReport {
                name: "a".into(),
                status: UnitStatus::Skipped {
                    reason: "done".into(),
                },
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"skipped\""), "{json}");
    }
}
