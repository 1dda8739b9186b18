//! Document assembly: merge single-page PDFs in index order and persist.
//!
//! Each [`PageArtifact`] is a complete one-page PDF. Its page object and
//! everything the page references are deep-copied into a fresh document
//! whose page tree lists them in the order given. The result is written
//! through a temporary file in the destination directory and renamed into
//! place, so the final name only ever holds a complete document.

use crate::error::ConvertError;
use crate::pipeline::page::PageArtifact;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PRODUCER: &str = concat!("album2pdf ", env!("CARGO_PKG_VERSION"));

/// Merge `artifacts` (already in page order) into one PDF and write it to `path`.
///
/// `title` ends up in the document information dictionary.
pub fn assemble_document(
    artifacts: &[PageArtifact],
    path: &Path,
    title: Option<&str>,
) -> Result<PathBuf, ConvertError> {
    let bytes = merge_pages(artifacts, title).map_err(|detail| ConvertError::AssemblyFailed {
        path: path.to_path_buf(),
        detail,
    })?;
    write_atomic(path, &bytes)?;
    info!(
        "Wrote {} pages ({} bytes) to {}",
        artifacts.len(),
        bytes.len(),
        path.display()
    );
    Ok(path.to_path_buf())
}

/// Merge the pages of every artifact into one serialized PDF.
pub fn merge_pages(artifacts: &[PageArtifact], title: Option<&str>) -> Result<Vec<u8>, String> {
    let mut target = Document::with_version("1.5");
    let pages_id = target.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let source = Document::load_mem(&artifact.pdf)
            .map_err(|e| format!("page #{} '{}' is not a valid PDF: {e}", artifact.index, artifact.name))?;

        // get_pages() is keyed by 1-based page number, so values come out in order.
        for page_id in source.get_pages().into_values() {
            let page = source
                .get_object(page_id)
                .map_err(|e| format!("page #{} '{}': {e}", artifact.index, artifact.name))?;
            let cloned = deep_clone(&source, &mut target, page);
            let cloned_id = target.add_object(cloned);
            if let Ok(Object::Dictionary(dict)) = target.get_object_mut(cloned_id) {
                dict.set("Parent", Object::Reference(pages_id));
            }
            kids.push(Object::Reference(cloned_id));
        }
    }

    let count = kids.len() as i64;
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    target.trailer.set("Root", catalog_id);

    let mut info = dictionary! { "Producer" => text_string(PRODUCER) };
    if let Some(title) = title {
        info.set("Title", text_string(title));
    }
    let info_id = target.add_object(info);
    target.trailer.set("Info", info_id);

    let mut out = Vec::new();
    target
        .save_to(&mut out)
        .map_err(|e| format!("serialization failed: {e}"))?;
    debug!("Merged {} pages → {} bytes", count, out.len());
    Ok(out)
}

/// Copy `object` into `target`, following references (except `/Parent`,
/// which the caller re-points at the new page tree).
fn deep_clone(source: &Document, target: &mut Document, object: &Object) -> Object {
    match object {
        Object::Dictionary(dict) => Object::Dictionary(clone_dictionary(source, target, dict)),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| deep_clone(source, target, item))
                .collect(),
        ),
        Object::Reference(id) => match source.get_object(*id) {
            Ok(referenced) => {
                let cloned = deep_clone(source, target, referenced);
                Object::Reference(target.add_object(cloned))
            }
            Err(e) => {
                warn!("Dangling reference {:?} while merging: {}", id, e);
                Object::Null
            }
        },
        Object::Stream(stream) => Object::Stream(Stream::new(
            clone_dictionary(source, target, &stream.dict),
            stream.content.clone(),
        )),
        other => other.clone(),
    }
}

fn clone_dictionary(source: &Document, target: &mut Document, dict: &Dictionary) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" {
            continue;
        }
        out.set(key.clone(), deep_clone(source, target, value));
    }
    out
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        return Object::string_literal(s);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Write `bytes` to `path` via a sibling temp file and an atomic rename.
///
/// On error nothing is left under `path` (an older file there is kept).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let persist_err = |source: std::io::Error| ConvertError::PersistFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(persist_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".album2pdf-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(persist_err)?;
    tmp.write_all(bytes).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

/// Directory holding `path`; `.` for a bare file name.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
