//! Configuration types for image-folder-to-PDF conversion.
//!
//! All per-unit conversion behaviour is controlled through
//! [`ConversionConfig`], built via its [`ConversionConfigBuilder`]. Batch
//! inputs (where the collections live and which ones to fetch) sit in
//! [`BatchConfig`]. Fidelity is an explicit [`Fidelity`] value passed into
//! the pipeline, never a shared lookup table.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for converting one directory of images into a PDF.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use album2pdf::{ConversionConfig, Fidelity};
///
/// let config = ConversionConfig::builder()
///     .concurrency(8)
///     .fidelity(Fidelity::High)
///     .encrypt_output(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.fidelity.dpi(), 200);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Number of images transformed at the same time. Default: 4.
    ///
    /// Each transformation decodes and re-encodes one image on the blocking
    /// thread pool, so values above the core count mostly add memory use.
    pub concurrency: usize,

    /// Output resolution applied uniformly to every page. Default: [`Fidelity::Mid`].
    pub fidelity: Fidelity,

    /// JPEG quality (1–100) used when embedding page images. Default: 90.
    pub jpeg_quality: u8,

    /// Pack the finished PDF into a password-protected ZIP. Default: false.
    pub encrypt_output: bool,

    /// Remove the plaintext PDF once its archive exists. Default: true.
    ///
    /// Only consulted when `encrypt_output` is set.
    pub delete_plaintext: bool,

    /// Treat any failed page as a failure of the whole unit. Default: false.
    ///
    /// The default skips undecodable images and still writes the document.
    pub strict: bool,

    /// Receives per-page and per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fidelity: Fidelity::default(),
            jpeg_quality: 90,
            encrypt_output: false,
            delete_plaintext: true,
            strict: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("concurrency", &self.concurrency)
            .field("fidelity", &self.fidelity)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("encrypt_output", &self.encrypt_output)
            .field("delete_plaintext", &self.delete_plaintext)
            .field("strict", &self.strict)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn fidelity(mut self, fidelity: Fidelity) -> Self {
        self.config.fidelity = fidelity;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn encrypt_output(mut self, v: bool) -> Self {
        self.config.encrypt_output = v;
        self
    }

    pub fn delete_plaintext(mut self, v: bool) -> Self {
        self.config.delete_plaintext = v;
        self
    }

    pub fn strict(mut self, v: bool) -> Self {
        self.config.strict = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(ConvertError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        Ok(self.config)
    }
}

/// Inputs for a batch run over several collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory the acquisition step fills with one subdirectory per collection.
    pub base_dir: PathBuf,

    /// External identifiers handed to the acquisition step, in order.
    pub collection_ids: Vec<String>,
}

impl BatchConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            collection_ids: Vec::new(),
        }
    }

    pub fn with_collections<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collection_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output resolution of every page, as a named DPI level.
///
/// A page's size in points is its pixel size scaled by `72 / dpi`, so higher
/// levels give physically smaller pages that print sharper; the embedded
/// pixels are never resampled.
///
/// | Level | DPI |
/// |-------|-----|
/// | `VeryLow` | 70 |
/// | `Low` | 100 |
/// | `Mid` | 150 (default) |
/// | `High` | 200 |
/// | `VeryHigh` | 300 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    VeryLow,
    Low,
    #[default]
    Mid,
    High,
    VeryHigh,
}

impl Fidelity {
    /// Every level, lowest first.
    pub const ALL: [Fidelity; 5] = [
        Fidelity::VeryLow,
        Fidelity::Low,
        Fidelity::Mid,
        Fidelity::High,
        Fidelity::VeryHigh,
    ];

    /// Resolution in dots per inch.
    pub fn dpi(self) -> u32 {
        match self {
            Fidelity::VeryLow => 70,
            Fidelity::Low => 100,
            Fidelity::Mid => 150,
            Fidelity::High => 200,
            Fidelity::VeryHigh => 300,
        }
    }

    /// Snake-case name, e.g. `very_high`.
    pub fn name(self) -> &'static str {
        match self {
            Fidelity::VeryLow => "very_low",
            Fidelity::Low => "low",
            Fidelity::Mid => "mid",
            Fidelity::High => "high",
            Fidelity::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} dpi)", self.name(), self.dpi())
    }
}

impl std::str::FromStr for Fidelity {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_lowercase().replace('-', "_");
        Fidelity::ALL
            .into_iter()
            .find(|f| f.name() == normalised)
            .ok_or_else(|| {
                ConvertError::InvalidConfig(format!(
                    "Unknown fidelity '{s}' (expected very_low, low, mid, high or very_high)"
                ))
            })
    }
}
