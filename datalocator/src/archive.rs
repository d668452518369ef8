//! Payload extraction for packaged resources.
//!
//! Handles the three packagings a resource can be stored in:
//! - `Raw`: copied verbatim
//! - `ZipEntry`: the entry named after the resource is copied out of a ZIP
//! - `XzStream`: a single XZ stream is decompressed
//!
//! Extraction always writes into a caller-provided writer, normally a staging
//! file from [`crate::store::CacheStore::staging_file`], never into the final
//! cache slot.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use xz2::read::XzDecoder;
use zip::ZipArchive;

use crate::classify::Packaging;

/// Buffer size for copying payloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Errors that can occur while unpacking a payload.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The ZIP container has no entry with the requested name.
    #[error("entry '{entry}' not found in archive")]
    EntryNotFound { entry: String },

    /// The payload is not a valid container or stream.
    #[error("corrupt {packaging} stream: {reason}")]
    CorruptStream { packaging: Packaging, reason: String },

    /// Reading the source or writing the destination failed.
    #[error("I/O error during extraction: {source}")]
    Io { source: Arc<io::Error> },
}

impl From<io::Error> for ArchiveError {
    fn from(e: io::Error) -> Self {
        ArchiveError::Io {
            source: Arc::new(e),
        }
    }
}

/// Stateless payload extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract a payload from a stream.
    ///
    /// ZIP containers need random access, so for `ZipEntry` the stream is
    /// first spooled into an anonymous temporary file.
    ///
    /// # Arguments
    ///
    /// * `packaging` - How the stream is packaged
    /// * `input` - The packaged bytes
    /// * `entry_name` - ZIP entry to extract (the resource's file name)
    /// * `dest` - Where the decompressed payload is written
    ///
    /// # Returns
    ///
    /// The number of payload bytes written.
    pub fn extract<R: Read, W: Write>(
        &self,
        packaging: Packaging,
        mut input: R,
        entry_name: &str,
        dest: &mut W,
    ) -> Result<u64, ArchiveError> {
        match packaging {
            Packaging::Raw => copy_payload(&mut input, dest, |e| e.into()),
            Packaging::XzStream => self.extract_xz(input, dest),
            Packaging::ZipEntry => {
                let mut spool = tempfile::tempfile()?;
                io::copy(&mut input, &mut spool)?;
                spool.seek(SeekFrom::Start(0))?;
                self.extract_zip_entry(BufReader::new(spool), entry_name, dest)
            }
        }
    }

    /// Extract a payload from a local file.
    pub fn extract_file<W: Write>(
        &self,
        packaging: Packaging,
        source: &Path,
        entry_name: &str,
        dest: &mut W,
    ) -> Result<u64, ArchiveError> {
        let file = File::open(source)?;
        match packaging {
            Packaging::ZipEntry => self.extract_zip_entry(BufReader::new(file), entry_name, dest),
            _ => self.extract(packaging, BufReader::new(file), entry_name, dest),
        }
    }

    /// Decompress a single-stream XZ payload.
    pub fn extract_xz<R: Read, W: Write>(&self, input: R, dest: &mut W) -> Result<u64, ArchiveError> {
        let mut decoder = XzDecoder::new(input);
        copy_payload(&mut decoder, dest, |e| ArchiveError::CorruptStream {
            packaging: Packaging::XzStream,
            reason: e.to_string(),
        })
    }

    /// Copy the entry named `entry_name` out of a ZIP container.
    ///
    /// The match is case-sensitive against the entry's full name or, for
    /// entries stored in sub-folders, its last path component. An exact full
    /// name match is preferred.
    pub fn extract_zip_entry<R: Read + Seek, W: Write>(
        &self,
        input: R,
        entry_name: &str,
        dest: &mut W,
    ) -> Result<u64, ArchiveError> {
        let corrupt = |reason: String| ArchiveError::CorruptStream {
            packaging: Packaging::ZipEntry,
            reason,
        };

        let mut archive = ZipArchive::new(input).map_err(|e| corrupt(e.to_string()))?;

        let found = find_entry(archive.file_names(), entry_name).ok_or_else(|| {
            ArchiveError::EntryNotFound {
                entry: entry_name.to_string(),
            }
        })?;

        let mut entry = archive
            .by_name(&found)
            .map_err(|e| corrupt(e.to_string()))?;

        copy_payload(&mut entry, dest, |e| corrupt(e.to_string()))
    }
}

fn find_entry<'a>(names: impl Iterator<Item = &'a str>, entry_name: &str) -> Option<String> {
    let mut nested = None;
    for name in names {
        if name.ends_with('/') {
            continue;
        }
        if name == entry_name {
            return Some(name.to_string());
        }
        if nested.is_none() && name.rsplit('/').next() == Some(entry_name) {
            nested = Some(name.to_string());
        }
    }
    nested
}

/// Copy `reader` into `writer`, mapping read failures with `on_read_err`.
///
/// Write failures are always reported as [`ArchiveError::Io`].
fn copy_payload<R, W, F>(reader: &mut R, writer: &mut W, on_read_err: F) -> Result<u64, ArchiveError>
where
    R: Read + ?Sized,
    W: Write,
    F: Fn(io::Error) -> ArchiveError,
{
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, writer);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(on_read_err(e)),
        };

        writer.write_all(&buffer[..bytes_read])?;
        written += bytes_read as u64;
    }

    writer.flush()?;
    Ok(written)
}
