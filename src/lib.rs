//! # album2pdf
//!
//! Turn folders of page images (scanned books, manga chapters, photo
//! albums) into one PDF per folder, optionally sealed in a
//! password-protected ZIP.
//!
//! ## Pipeline Overview
//!
//! ```text
//! collection dir
//!  │
//!  ├─ 1. Input     walk the directory for .jpg/.jpeg/.png
//!  ├─ 2. Order     natural sort: 2.jpg before 10.jpg
//!  ├─ 3. Page      image → single-page PDF (bounded pool, spawn_blocking)
//!  ├─ 4. Assemble  merge pages in index order, atomic write
//!  └─ 5. Archive   optional AES-256 ZIP with a fresh random password
//! ```
//!
//! Pages always follow the order of the sorted image list, however many
//! workers run and whichever finishes first. An image that cannot be
//! decoded is skipped and reported; the unit fails only when no page at all
//! could be produced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use album2pdf::{convert_dir, ConversionConfig, Fidelity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .concurrency(4)
//!         .fidelity(Fidelity::High)
//!         .encrypt_output(true)
//!         .build()?;
//!     let output = convert_dir("scans/422866", "scans/422866.pdf", &config).await?;
//!     if let Some(archive) = &output.archive {
//!         println!("{} password: {}", archive.path.display(), archive.credential.expose());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Batches
//!
//! [`run_batch`] acquires a list of collections through a
//! [`CollectionSource`] and converts every subdirectory of a base directory,
//! skipping units whose output already exists.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `album2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, AcquisitionReport, BatchReport, UnitReport, UnitStatus};
pub use config::{BatchConfig, ConversionConfig, ConversionConfigBuilder, Fidelity};
pub use convert::{convert_dir, convert_items, convert_sync, document_path};
pub use error::{ConvertError, PageError};
pub use output::{ConversionOutput, ConversionStats, PageResult};
pub use pipeline::archive::{archive_document, archive_path_for, ArchiveOutcome, Credential};
pub use pipeline::assemble::assemble_document;
pub use pipeline::input::{list_images, Item};
pub use pipeline::order::{natural_cmp, sort_natural, NaturalKey};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use source::{CollectionSource, CommandSource, LocalSource};
