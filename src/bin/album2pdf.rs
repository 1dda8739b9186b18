//! CLI binary for album2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `BatchConfig` and prints results.

use album2pdf::{
    convert_dir, run_batch, BatchConfig, BatchReport, CollectionSource, CommandSource,
    ConversionConfig, ConversionOutput, ConversionProgressCallback, Fidelity, LocalSource,
    ProgressCallback, UnitStatus,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar for the unit being converted. Pages complete out of
/// order, so per-page timings are keyed by page number.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, unit: &str, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(unit.to_string());
        self.bar.reset_eta();
        self.errors.store(0, Ordering::SeqCst);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{unit}: {total_pages} images"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, name: &str) {
        let secs = self.elapsed_secs(page_num);
        self.bar.set_message(name.to_string());
        if secs > 1.0 {
            self.bar.println(format!(
                "  {} {}  {}",
                green("✓"),
                name,
                dim(&format!("{secs:.1}s"))
            ));
        }
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, _total: usize, error: &str) {
        self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 100 {
            let cut: String = error.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {}", red("✗"), red(&msg)));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, unit: &str, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        let mark = if failed == 0 {
            green("✔")
        } else if success_count == 0 {
            red("✘")
        } else {
            cyan("⚠")
        };
        self.bar.println(format!(
            "{} {}: {}/{} pages{}",
            mark,
            unit,
            bold(&success_count.to_string()),
            total_pages,
            if failed > 0 {
                format!("  ({} skipped)", red(&failed.to_string()))
            } else {
                String::new()
            }
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every subdirectory of ./scans into ./scans/<name>.pdf
  album2pdf --base-dir scans

  # Same, sealed in password-protected ZIPs (passwords printed on stdout)
  album2pdf --base-dir scans --encrypt

  # Fetch collections first with an external downloader
  album2pdf --base-dir scans --acquire-cmd gallery-dl \
      --acquire-arg=-d --acquire-arg={base_dir} \
      --acquire-arg=https://example.org/g/{id} 422866 177013

  # One directory, explicit output, high fidelity
  album2pdf --input scans/vol1 -o vol1.pdf --fidelity high

FIDELITY (page size = pixels × 72 / DPI; pixels are never resampled):
  very-low  70 dpi     low  100 dpi     mid  150 dpi (default)
  high     200 dpi     very-high  300 dpi

ENVIRONMENT VARIABLES:
  Every flag has an ALBUM2PDF_* fallback, e.g. ALBUM2PDF_BASE_DIR,
  ALBUM2PDF_WORKERS, ALBUM2PDF_FIDELITY, ALBUM2PDF_ENCRYPT.
  RUST_LOG overrides the log filter.
"#;

/// Convert folders of page images into PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "album2pdf",
    version,
    about = "Convert folders of page images into ordered PDFs, optionally password-protected",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Collection ids to acquire before converting (needs --acquire-cmd).
    ids: Vec<String>,

    /// Directory whose subdirectories are converted.
    #[arg(short, long, env = "ALBUM2PDF_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Convert just this directory instead of running a batch.
    #[arg(short, long, env = "ALBUM2PDF_INPUT", conflicts_with = "ids")]
    input: Option<PathBuf>,

    /// Output file for --input (default: <input>.pdf next to it).
    #[arg(short, long, env = "ALBUM2PDF_OUTPUT", requires = "input")]
    output: Option<PathBuf>,

    /// Maximum images transformed at once.
    #[arg(short, long, env = "ALBUM2PDF_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Page size fidelity.
    #[arg(long, env = "ALBUM2PDF_FIDELITY", value_enum, default_value = "mid")]
    fidelity: FidelityArg,

    /// JPEG quality used when embedding images (1–100).
    #[arg(long, env = "ALBUM2PDF_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Seal each PDF in a password-protected ZIP.
    #[arg(long, env = "ALBUM2PDF_ENCRYPT")]
    encrypt: bool,

    /// Keep the plain PDF next to its archive.
    #[arg(long, env = "ALBUM2PDF_KEEP_PLAINTEXT")]
    keep_plaintext: bool,

    /// Fail a unit when any of its images cannot be converted.
    #[arg(long, env = "ALBUM2PDF_STRICT")]
    strict: bool,

    /// Program run once per collection id to fetch its images.
    #[arg(long, env = "ALBUM2PDF_ACQUIRE_CMD")]
    acquire_cmd: Option<String>,

    /// Argument for --acquire-cmd; `{id}` and `{base_dir}` are substituted.
    #[arg(long = "acquire-arg", allow_hyphen_values = true)]
    acquire_args: Vec<String>,

    /// Print the report as JSON on stdout.
    #[arg(long, env = "ALBUM2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ALBUM2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Exit non-zero when any collection or unit failed.
    #[arg(long, env = "ALBUM2PDF_FAIL_ON_ERROR")]
    fail_on_error: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ALBUM2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and passwords.
    #[arg(short, long, env = "ALBUM2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FidelityArg {
    VeryLow,
    Low,
    Mid,
    High,
    VeryHigh,
}

impl From<FidelityArg> for Fidelity {
    fn from(v: FidelityArg) -> Self {
        match v {
            FidelityArg::VeryLow => Fidelity::VeryLow,
            FidelityArg::Low => Fidelity::Low,
            FidelityArg::Mid => Fidelity::Mid,
            FidelityArg::High => Fidelity::High,
            FidelityArg::VeryHigh => Fidelity::VeryHigh,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;

    // ── Single directory ─────────────────────────────────────────────────
    if let Some(ref input) = cli.input {
        let output_path = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_for(input));
        let result = convert_dir(input, &output_path, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let output = result.context("Conversion failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else {
            print_unit(&cli, &output);
        }
        if cli.fail_on_error && output.stats.failed_pages > 0 {
            bail!("{} images could not be converted", output.stats.failed_pages);
        }
        return Ok(());
    }

    // ── Batch ────────────────────────────────────────────────────────────
    let source: Box<dyn CollectionSource> = match cli.acquire_cmd {
        Some(ref program) => Box::new(CommandSource::new(program).args(cli.acquire_args.clone())),
        None => Box::new(LocalSource),
    };
    let batch = BatchConfig::new(&cli.base_dir).with_collections(cli.ids.clone());

    let result = run_batch(&batch, &config, source.as_ref()).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let report = result.context("Batch failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        print_report(&cli, &report);
    }

    if cli.fail_on_error && !report.is_clean() {
        bail!(
            "{} units and {} acquisitions failed",
            report.failed(),
            report.failed_acquisitions()
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .concurrency(cli.workers)
        .fidelity(cli.fidelity.into())
        .jpeg_quality(cli.quality)
        .encrypt_output(cli.encrypt)
        .delete_plaintext(!cli.keep_plaintext)
        .strict(cli.strict);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `<dir>.pdf` as a sibling of `dir`.
fn default_output_for(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    album2pdf::document_path(parent, &name)
}

/// Passwords always go to stdout, even with --quiet.
fn print_unit(cli: &Cli, output: &ConversionOutput) {
    if let Some(ref archive) = output.archive {
        println!("{}\t{}", archive.path.display(), archive.credential.expose());
    }
    if cli.quiet {
        return;
    }
    let target = output
        .archive
        .as_ref()
        .map(|a| a.path.clone())
        .unwrap_or_else(|| output.document.clone());
    eprintln!(
        "{}  {}/{} pages  {}ms  →  {}",
        if output.stats.failed_pages == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        output.stats.processed_pages,
        output.stats.total_pages,
        output.stats.total_duration_ms,
        bold(&target.display().to_string()),
    );
}

fn print_report(cli: &Cli, report: &BatchReport) {
    for acq in &report.acquisitions {
        if let Some(ref err) = acq.error {
            eprintln!("{} {}", red("✘"), err);
        }
    }
    for unit in &report.units {
        match unit.status {
            UnitStatus::Converted(ref output) => print_unit(cli, output),
            UnitStatus::Skipped { ref reason } if !cli.quiet => {
                eprintln!("{} {}  {}", dim("-"), unit.name, dim(reason));
            }
            UnitStatus::Skipped { .. } => {}
            UnitStatus::Failed { ref error } => eprintln!("{} {}", red("✘"), error),
        }
    }
    if !cli.quiet {
        eprintln!(
            "{} converted, {} skipped, {} failed  {}",
            bold(&report.converted().to_string()),
            report.skipped(),
            if report.failed() > 0 {
                red(&report.failed().to_string())
            } else {
                report.failed().to_string()
            },
            dim(&format!("{}ms", report.total_duration_ms)),
        );
    }
}
