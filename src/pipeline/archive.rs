//! Secure archival: pack a finished document into a password-protected ZIP.
//!
//! A fresh [`Credential`] is drawn for every archive. The container is
//! written next to the document as `<document>.zip` (AES-256, Deflate),
//! first to a temporary file and then renamed into place, so an existing
//! `.zip` always means a complete archive. The plaintext is only removed
//! after the container is confirmed on disk.
//!
//! The password protects against casual access, nothing more: the library
//! never stores it and returns it to the caller exactly once.

use crate::error::ConvertError;
use crate::pipeline::assemble::parent_dir;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

/// Extension appended to the document path.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Number of characters in a generated credential.
pub const CREDENTIAL_LEN: usize = 12;

/// ASCII letters, digits and punctuation: 94 symbols.
const ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Archive password. `Debug` is redacted; use [`Credential::expose`] to read it.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Draw a new credential of [`CREDENTIAL_LEN`] characters.
    pub fn generate() -> Result<Self, ConvertError> {
        let rng = SystemRandom::new();
        // Reject bytes past the largest multiple of the alphabet size so every
        // symbol is equally likely.
        let limit = (256 / ALPHABET.len() * ALPHABET.len()) as u8;
        let mut out = String::with_capacity(CREDENTIAL_LEN);
        let mut buf = [0u8; 32];
        while out.len() < CREDENTIAL_LEN {
            rng.fill(&mut buf)
                .map_err(|_| ConvertError::Internal("random source unavailable".into()))?;
            for &b in buf.iter().filter(|&&b| b < limit) {
                if out.len() == CREDENTIAL_LEN {
                    break;
                }
                out.push(ALPHABET[b as usize % ALPHABET.len()] as char);
            }
        }
        Ok(Self(out))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Result of a successful archival.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    pub path: PathBuf,
    pub credential: Credential,
    /// Whether the plaintext document was deleted.
    pub plaintext_removed: bool,
}

/// `<document>.zip` for a document path.
pub fn archive_path_for(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_os_string();
    name.push(".");
    name.push(ARCHIVE_EXTENSION);
    PathBuf::from(name)
}

/// Archive `document` under a fresh credential, optionally deleting it afterwards.
///
/// On failure the document is left exactly as it was.
pub fn archive_document(
    document: &Path,
    delete_plaintext: bool,
) -> Result<ArchiveOutcome, ConvertError> {
    let archive = archive_path_for(document);
    let fail = |detail: String| ConvertError::ArchiveFailed {
        path: document.to_path_buf(),
        detail,
    };

    let entry_name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| fail("document path has no file name".into()))?;

    let credential = Credential::generate().map_err(|e| fail(e.to_string()))?;
    write_container(document, &archive, &entry_name, &credential).map_err(fail)?;

    let confirmed = std::fs::metadata(&archive)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    if !confirmed {
        return Err(fail(format!("{} missing after write", archive.display())));
    }

    let mut plaintext_removed = false;
    if delete_plaintext {
        match std::fs::remove_file(document) {
            Ok(()) => plaintext_removed = true,
            Err(e) => warn!(
                "Archive created but could not remove {}: {}",
                document.display(),
                e
            ),
        }
    }

    info!("Archived {} → {}", document.display(), archive.display());
    Ok(ArchiveOutcome {
        path: archive,
        credential,
        plaintext_removed,
    })
}

/// Write the encrypted container via a sibling temp file.
fn write_container(
    document: &Path,
    archive: &Path,
    entry_name: &str,
    credential: &Credential,
) -> Result<(), String> {
    let mut input = std::fs::File::open(document)
        .map_err(|e| format!("cannot open {}: {e}", document.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".album2pdf-")
        .suffix(".tmp")
        .tempfile_in(parent_dir(archive))
        .map_err(|e| format!("cannot create temp file: {e}"))?;

    {
        let mut zip = ZipWriter::new(tmp.as_file_mut());
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .with_aes_encryption(AesMode::Aes256, credential.expose());
        zip.start_file(entry_name, options)
            .map_err(|e| format!("zip entry: {e}"))?;
        io::copy(&mut input, &mut zip).map_err(|e| format!("zip write: {e}"))?;
        let mut file = zip.finish().map_err(|e| format!("zip finish: {e}"))?;
        file.flush().map_err(|e| format!("flush: {e}"))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("sync: {e}"))?;
    tmp.persist(archive)
        .map_err(|e| format!("cannot place {}: {}", archive.display(), e.error))?;
    Ok(())
}
