//! Input enumeration: turn a collection directory into the ordered item list.
//!
//! Images are found recursively (chapters often live in nested folders) and
//! named by their path relative to the collection directory, with `/` as the
//! separator on every platform. The names are sorted with
//! [`super::order::NaturalKey`] before any work starts, so page order never
//! depends on directory iteration order.

use super::order::NaturalKey;
use crate::error::{ConvertError, PageError};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File extensions accepted as page images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Where an item's bytes come from.
#[derive(Debug, Clone)]
pub enum ItemSource {
    /// Read lazily by the worker that transforms the item.
    File(PathBuf),
    /// Already in memory.
    Bytes(Vec<u8>),
}

/// One source image.
#[derive(Debug, Clone)]
pub struct Item {
    /// Identifier used in ordering, logs and errors.
    pub name: String,
    pub source: ItemSource,
}

impl Item {
    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ItemSource::File(path.into()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: ItemSource::Bytes(bytes),
        }
    }

    /// Consume the item and return its raw content.
    ///
    /// `index` is only used to label the error.
    pub fn into_bytes(self, index: usize) -> Result<(String, Vec<u8>), PageError> {
        match self.source {
            ItemSource::Bytes(bytes) => Ok((self.name, bytes)),
            ItemSource::File(path) => match std::fs::read(&path) {
                Ok(bytes) => Ok((self.name, bytes)),
                Err(e) => Err(PageError::ReadFailed {
                    index,
                    name: self.name,
                    detail: e.to_string(),
                }),
            },
        }
    }
}

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Collect every image under `dir` into a naturally ordered item list.
///
/// Returns an empty list for a directory without images; the pipeline turns
/// that into [`ConvertError::EmptyDocument`].
pub fn list_images(dir: &Path) -> Result<Vec<Item>, ConvertError> {
    if !dir.is_dir() {
        return Err(ConvertError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| ConvertError::ListingFailed {
            path: dir.to_path_buf(),
            detail: e.to_string(),
        })?;
        if !entry.file_type().is_file() || !is_supported_image(entry.path()) {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        items.push(Item::from_file(name, entry.path()));
    }

    items.sort_by_cached_key(|item| NaturalKey::new(&item.name));
    debug!("Found {} images under {}", items.len(), dir.display());
    Ok(items)
}
