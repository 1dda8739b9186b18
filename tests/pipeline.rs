//! Integration tests: image folders on disk → PDF (→ ZIP), checked by
//! re-opening the output with lopdf and zip.
//!
//! Every generated image gets a distinct pixel width, so the MediaBox widths
//! of the resulting pages identify which image ended up where.

use album2pdf::{
    archive_document, archive_path_for, convert_dir, convert_sync, run_batch, BatchConfig,
    CollectionSource, ConversionConfig, ConversionProgressCallback, ConvertError, Fidelity,
    LocalSource, UnitStatus,
};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Document, Object};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("album2pdf=debug")
        .with_test_writer()
        .try_init();
}

fn write_image(path: &Path, width: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") | Some("JPG") => ImageFormat::Jpeg,
        _ => ImageFormat::Png,
    };
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 30, Rgb([40, 80, 120])))
        .save_with_format(path, format)
        .unwrap();
}

/// Page widths in points, in page order.
fn page_widths(pdf: &Path) -> Vec<f32> {
    let doc = Document::load(pdf).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            match &page.get(b"MediaBox").unwrap().as_array().unwrap()[2] {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r as f32,
                other => panic!("unexpected MediaBox entry {other:?}"),
            }
        })
        .collect()
}

/// Points for `px` pixels at `fidelity`.
fn pt(px: u32, fidelity: Fidelity) -> f32 {
    px as f32 * 72.0 / fidelity.dpi() as f32
}

fn assert_widths(got: &[f32], want: &[f32]) {
    assert_eq!(got.len(), want.len(), "got {got:?}, want {want:?}");
    for (g, w) in got.iter().zip(want) {
        assert!((g - w).abs() < 0.05, "got {got:?}, want {want:?}");
    }
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn numbered_jpegs_in_natural_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    // Created out of order on purpose.
    write_image(&album.join("10.jpg"), 100);
    write_image(&album.join("2.jpg"), 20);
    write_image(&album.join("1.jpg"), 10);

    let config = ConversionConfig::builder()
        .concurrency(2)
        .fidelity(Fidelity::Mid)
        .build()
        .unwrap();
    let out = dir.path().join("album.pdf");
    let output = convert_dir(&album, &out, &config).await.unwrap();

    let names: Vec<&str> = output.pages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["1.jpg", "2.jpg", "10.jpg"]);
    assert_eq!(output.stats.processed_pages, 3);
    assert_widths(
        &page_widths(&out),
        &[pt(10, Fidelity::Mid), pt(20, Fidelity::Mid), pt(100, Fidelity::Mid)],
    );
}

#[tokio::test]
async fn worker_count_does_not_change_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    // Larger images first so early workers finish last.
    let n = 12u32;
    for i in (1..=n).rev() {
        write_image(&album.join(format!("page{i}.png")), 20 + i * 7);
    }
    let expected: Vec<f32> = (1..=n).map(|i| pt(20 + i * 7, Fidelity::Low)).collect();

    for workers in [1, 2, n as usize] {
        let config = ConversionConfig::builder()
            .concurrency(workers)
            .fidelity(Fidelity::Low)
            .build()
            .unwrap();
        let out = dir.path().join(format!("album-{workers}.pdf"));
        convert_dir(&album, &out, &config).await.unwrap();
        assert_widths(&page_widths(&out), &expected);
    }
}

#[tokio::test]
async fn nested_chapters_are_ordered_by_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("series");
    write_image(&album.join("ch10/1.png"), 30);
    write_image(&album.join("ch2/1.png"), 20);
    write_image(&album.join("ch1/2.png"), 12);
    write_image(&album.join("ch1/1.png"), 11);

    let out = dir.path().join("series.pdf");
    let output = convert_dir(&album, &out, &ConversionConfig::default())
        .await
        .unwrap();
    let names: Vec<&str> = output.pages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["ch1/1.png", "ch1/2.png", "ch2/1.png", "ch10/1.png"]);
}

// ── Item failures ────────────────────────────────────────────────────────────

#[tokio::test]
async fn undecodable_image_is_skipped_and_order_kept() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    for i in 1..=5u32 {
        write_image(&album.join(format!("{i}.png")), 10 * i);
    }
    fs::write(album.join("3.png"), b"this is not a png").unwrap();

    let out = dir.path().join("album.pdf");
    let output = convert_dir(&album, &out, &ConversionConfig::default())
        .await
        .unwrap();

    assert_eq!(output.stats.total_pages, 5);
    assert_eq!(output.stats.failed_pages, 1);
    let failed: Vec<&str> = output.page_errors().map(|e| e.name()).collect();
    assert_eq!(failed, ["3.png"]);
    assert_widths(
        &page_widths(&out),
        &[10, 20, 40, 50].map(|px| pt(px, Fidelity::Mid)),
    );
}

#[tokio::test]
async fn all_images_undecodable_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("broken");
    fs::create_dir_all(&album).unwrap();
    fs::write(album.join("1.jpg"), b"nope").unwrap();
    fs::write(album.join("2.jpg"), b"nope").unwrap();

    let out = dir.path().join("broken.pdf");
    let err = convert_dir(&album, &out, &ConversionConfig::default())
        .await
        .unwrap_err();

    match err {
        ConvertError::EmptyDocument { total, failed, .. } => {
            assert_eq!((total, failed), (2, 2));
        }
        other => panic!("expected EmptyDocument, got {other:?}"),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn missing_directory_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = convert_dir(dir.path().join("nope"), dir.path().join("x.pdf"), &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::DirectoryNotFound { .. }));
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    errored: AtomicUsize,
    units: AtomicUsize,
}

impl ConversionProgressCallback for Counting {
    fn on_conversion_start(&self, _unit: &str, _total_pages: usize) {
        self.units.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_start(&self, _page_num: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_complete(&self, _page_num: usize, _total: usize, _name: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_error(&self, _page_num: usize, _total: usize, _error: &str) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_image() {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    write_image(&album.join("a.png"), 10);
    write_image(&album.join("b.png"), 11);
    fs::write(album.join("c.png"), b"junk").unwrap();

    let counter = Arc::new(Counting::default());
    let config = ConversionConfig::builder()
        .progress_callback(counter.clone())
        .build()
        .unwrap();
    convert_dir(&album, dir.path().join("album.pdf"), &config)
        .await
        .unwrap();

    assert_eq!(counter.units.load(Ordering::SeqCst), 1);
    assert_eq!(counter.started.load(Ordering::SeqCst), 3);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 2);
    assert_eq!(counter.errored.load(Ordering::SeqCst), 1);
}

/// Tracks how many images are between start and completion at once.
#[derive(Default)]
struct InFlight {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConversionProgressCallback for InFlight {
    fn on_page_start(&self, _page_num: usize, _total: usize) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }
    fn on_page_complete(&self, _page_num: usize, _total: usize, _name: &str) {
        self.leave();
    }
    fn on_page_error(&self, _page_num: usize, _total: usize, _error: &str) {
        self.leave();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn worker_pool_never_exceeds_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    for i in 1..=24u32 {
        write_image(&album.join(format!("{i}.png")), 600);
    }

    let tracker = Arc::new(InFlight::default());
    let config = ConversionConfig::builder()
        .concurrency(3)
        .progress_callback(tracker.clone())
        .build()
        .unwrap();
    let output = convert_dir(&album, dir.path().join("album.pdf"), &config)
        .await
        .unwrap();

    assert_eq!(output.stats.processed_pages, 24);
    let peak = tracker.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "{peak} images in flight with concurrency 3");
    assert!(peak > 1, "pool never ran images in parallel");
    assert_eq!(tracker.active.load(Ordering::SeqCst), 0);
}

#[test]
fn convert_sync_runs_without_a_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    write_image(&album.join("1.png"), 15);

    let out = dir.path().join("album.pdf");
    let output = convert_sync(&album, &out, &ConversionConfig::default()).unwrap();
    assert_eq!(output.document, out);
    assert_eq!(page_widths(&out).len(), 1);
}

// ── Archival ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn encrypted_output_opens_with_returned_password() {
    let dir = tempfile::tempdir().unwrap();
    let album = dir.path().join("album");
    write_image(&album.join("1.png"), 10);
    write_image(&album.join("2.png"), 20);

    let config = ConversionConfig::builder()
        .encrypt_output(true)
        .build()
        .unwrap();
    let out = dir.path().join("album.pdf");
    let output = convert_dir(&album, &out, &config).await.unwrap();
    let archive = output.archive.expect("archive outcome");

    assert_eq!(archive.path, archive_path_for(&out));
    assert!(archive.plaintext_removed);
    assert!(!out.exists());

    let mut zip = zip::ZipArchive::new(fs::File::open(&archive.path).unwrap()).unwrap();
    let mut entry = zip
        .by_name_decrypt("album.pdf", archive.credential.expose().as_bytes())
        .unwrap();
    let mut pdf = Vec::new();
    entry.read_to_end(&mut pdf).unwrap();
    let doc = Document::load_mem(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn failed_archival_leaves_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("album.pdf");
    fs::write(&doc, b"%PDF-1.5 body").unwrap();
    // A directory squatting on the archive name makes the final rename fail.
    fs::create_dir(archive_path_for(&doc)).unwrap();
    fs::write(archive_path_for(&doc).join("keep"), b"x").unwrap();

    let err = archive_document(&doc, true).unwrap_err();
    assert!(matches!(err, ConvertError::ArchiveFailed { .. }), "{err:?}");
    assert_eq!(fs::read(&doc).unwrap(), b"%PDF-1.5 body");
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rerun_skips_archived_units() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("vol1/1.png"), 10);
    write_image(&dir.path().join("vol2/1.png"), 12);

    let config = ConversionConfig::builder()
        .encrypt_output(true)
        .build()
        .unwrap();
    let batch = BatchConfig::new(dir.path());

    let first = run_batch(&batch, &config, &LocalSource).await.unwrap();
    assert_eq!(first.converted(), 2);
    let zip1 = dir.path().join("vol1.pdf.zip");
    let before = fs::read(&zip1).unwrap();
    let modified = fs::metadata(&zip1).unwrap().modified().unwrap();

    let second = run_batch(&batch, &config, &LocalSource).await.unwrap();
    assert_eq!(second.converted(), 0);
    assert_eq!(second.skipped(), 2);
    assert!(!dir.path().join("vol1.pdf").exists());
    assert_eq!(fs::read(&zip1).unwrap(), before);
    assert_eq!(fs::metadata(&zip1).unwrap().modified().unwrap(), modified);
}

#[tokio::test]
async fn plain_rerun_skips_existing_documents() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("one/1.png"), 10);

    let batch = BatchConfig::new(dir.path());
    let config = ConversionConfig::default();
    run_batch(&batch, &config, &LocalSource).await.unwrap();
    let report = run_batch(&batch, &config, &LocalSource).await.unwrap();

    assert_eq!(report.units.len(), 1);
    assert!(matches!(report.units[0].status, UnitStatus::Skipped { .. }));
}

struct FlakySource {
    calls: AtomicUsize,
}

#[async_trait]
impl CollectionSource for FlakySource {
    async fn acquire(&self, collection_id: &str, _base_dir: &Path) -> Result<(), ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if collection_id == "bad" {
            return Err(ConvertError::AcquisitionFailed {
                collection: collection_id.to_string(),
                detail: "server said no".into(),
            });
        }
        Ok(())
    }
}

#[tokio::test]
async fn acquisition_failure_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("good/1.png"), 10);

    let source = FlakySource {
        calls: AtomicUsize::new(0),
    };
    let batch = BatchConfig::new(dir.path()).with_collections(["bad", "good"]);
    let report = run_batch(&batch, &ConversionConfig::default(), &source)
        .await
        .unwrap();

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.failed_acquisitions(), 1);
    assert!(report.acquisitions[0].error.as_deref().unwrap().contains("bad"));
    assert_eq!(report.converted(), 1);
    assert!(dir.path().join("good.pdf").exists());
}

#[tokio::test]
async fn batch_report_serialises_passwords() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("a/1.png"), 10);

    let config = ConversionConfig::builder()
        .encrypt_output(true)
        .delete_plaintext(false)
        .build()
        .unwrap();
    let report = run_batch(&BatchConfig::new(dir.path()), &config, &LocalSource)
        .await
        .unwrap();

    let password = match &report.units[0].status {
        UnitStatus::Converted(out) => out.archive.as_ref().unwrap().credential.expose().to_string(),
        other => panic!("unexpected {other:?}"),
    };
    assert!(dir.path().join("a.pdf").exists());
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["units"][0]["status"], "converted");
    assert_eq!(json["units"][0]["archive"]["credential"], password.as_str());
}
