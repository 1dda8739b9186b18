//! Collection acquisition: how a named collection's images reach the base
//! directory before conversion.
//!
//! Fetching is outside this crate. The [`CollectionSource`] trait is the
//! seam: the orchestrator calls [`CollectionSource::acquire`] once per
//! collection id and then converts whatever subdirectories exist.
//! Implementations must be idempotent, since the orchestrator may be re-run
//! over the same base directory.

use crate::error::ConvertError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Something that can place a collection's images under `base_dir`.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn acquire(&self, collection_id: &str, base_dir: &Path) -> Result<(), ConvertError>;
}

/// Images are already on disk; acquisition only checks the base directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSource;

#[async_trait]
impl CollectionSource for LocalSource {
    async fn acquire(&self, collection_id: &str, base_dir: &Path) -> Result<(), ConvertError> {
        if tokio::fs::metadata(base_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            debug!("Collection '{}': using images already on disk", collection_id);
            Ok(())
        } else {
            Err(ConvertError::AcquisitionFailed {
                collection: collection_id.to_string(),
                detail: format!("base directory '{}' does not exist", base_dir.display()),
            })
        }
    }
}

/// Runs an external downloader once per collection.
///
/// `{id}` and `{base_dir}` inside any argument are replaced before the
/// program is spawned. A non-zero exit status fails the acquisition.
///
/// ```
/// use album2pdf::CommandSource;
///
/// let source = CommandSource::new("gallery-dl")
///     .arg("--dest")
///     .arg("{base_dir}")
///     .arg("https://example.org/g/{id}");
/// assert_eq!(source.program(), "gallery-dl");
/// ```
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with placeholders substituted for one collection.
    pub fn resolved_args(&self, collection_id: &str, base_dir: &Path) -> Vec<String> {
        let base = base_dir.display().to_string();
        self.args
            .iter()
            .map(|a| a.replace("{id}", collection_id).replace("{base_dir}", &base))
            .collect()
    }
}

#[async_trait]
impl CollectionSource for CommandSource {
    async fn acquire(&self, collection_id: &str, base_dir: &Path) -> Result<(), ConvertError> {
        let fail = |detail: String| ConvertError::AcquisitionFailed {
            collection: collection_id.to_string(),
            detail,
        };

        tokio::fs::create_dir_all(base_dir)
            .await
            .map_err(|e| fail(format!("cannot create '{}': {e}", base_dir.display())))?;

        let args = self.resolved_args(collection_id, base_dir);
        debug!("Collection '{}': running {} {:?}", collection_id, self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| fail(format!("failed to launch '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.trim().lines().last().unwrap_or("").to_string();
            return Err(fail(format!(
                "'{}' exited with {}{}",
                self.program,
                output.status,
                if tail.is_empty() {
                    String::new()
                } else {
                    format!(": {tail}")
                }
            )));
        }

        info!("Collection '{}' acquired via {}", collection_id, self.program);
        Ok(())
    }
}
