//! Streaming archive codec
//!
//! Reader and writer sessions over the zip container holding a snapshot:
//! a tree of named byte blobs (the application files) plus the two
//! manifest entries (dump script and environment descriptor).
//!
//! Both directions are streaming. Entries can be far larger than available
//! memory; the writer copies from any [`Read`] source and the reader copies
//! into any [`Write`] sink. Only the two small manifest entries are ever
//! buffered whole (via [`ArchiveReader::read_entry_to_string`]).
//!
//! Entry names are forward-slash separated paths relative to the
//! application root. Names are unique within one archive, and the
//! restore-side sanitizer rejects names that would escape the root.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, SitepackError};

/// One entry of an archive: its logical path and uncompressed size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash separated path relative to the application root
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// Writer session producing one archive
///
/// Closing the session with [`ArchiveWriter::finish`] finalizes the
/// container. A session closed after zero entries still produces a valid
/// empty archive, and a session abandoned mid-entry never corrupts the
/// entries already written.
pub struct ArchiveWriter {
    inner: ZipWriter<File>,
    names: HashSet<String>,
}

impl ArchiveWriter {
    /// Create a new archive at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        debug!(path = %path.display(), "opened archive writer");
        Ok(Self {
            inner: ZipWriter::new(file),
            names: HashSet::new(),
        })
    }

    fn start_entry(&mut self, name: &str, large: bool) -> Result<()> {
        if !self.names.insert(name.to_string()) {
            return Err(SitepackError::DuplicateEntry(name.to_string()));
        }
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(large);
        self.inner.start_file(name, options)?;
        Ok(())
    }

    /// Stream one entry into the archive from any byte source
    ///
    /// Returns the number of bytes written. Fails with `DuplicateEntry` if
    /// `name` was already added. On a read error the half-written entry is
    /// aborted and the archive stays valid for further additions.
    pub fn add_file<R: Read>(&mut self, name: &str, mut source: R) -> Result<u64> {
        self.start_entry(name, true)?;
        match io::copy(&mut source, &mut self.inner) {
            Ok(written) => {
                trace!(name, written, "added archive entry");
                Ok(written)
            }
            Err(e) => {
                let _ = self.inner.abort_file();
                self.names.remove(name);
                Err(e.into())
            }
        }
    }

    /// Add one entry from an in-memory buffer
    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.start_entry(name, bytes.len() as u64 > u32::MAX as u64)?;
        self.inner.write_all(bytes)?;
        trace!(name, written = bytes.len(), "added archive entry");
        Ok(())
    }

    /// Finalize the container
    pub fn finish(self) -> Result<()> {
        self.inner.finish()?;
        Ok(())
    }
}

/// Reader session over one archive
pub struct ArchiveReader {
    inner: ZipArchive<File>,
}

impl ArchiveReader {
    /// Open an existing archive; fails with `CorruptArchive` if the file
    /// is not a valid container
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let inner = ZipArchive::new(file)?;
        debug!(path = %path.display(), entries = inner.len(), "opened archive reader");
        Ok(Self { inner })
    }

    /// Names and sizes of all entries, in container order
    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::with_capacity(self.inner.len());
        for index in 0..self.inner.len() {
            let entry = self.inner.by_index(index)?;
            entries.push(ArchiveEntry {
                name: entry.name().to_string(),
                size: entry.size(),
            });
        }
        Ok(entries)
    }

    /// Stream one entry's bytes into `sink`; `NotFound` if absent
    pub fn extract_entry<W: Write>(&mut self, name: &str, sink: &mut W) -> Result<u64> {
        let mut entry = match self.inner.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(SitepackError::not_found(format!("archive entry {name}")))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(io::copy(&mut entry, sink)?)
    }

    /// Buffer one entry as UTF-8 text
    ///
    /// Only used for the dump script and environment descriptor entries,
    /// which are bounded by schema/row text size rather than tree size.
    pub fn read_entry_to_string(&mut self, name: &str) -> Result<String> {
        let mut text = String::new();
        let mut entry = match self.inner.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(SitepackError::not_found(format!("archive entry {name}")))
            }
            Err(e) => return Err(e.into()),
        };
        entry.read_to_string(&mut text)?;
        Ok(text)
    }
}

/// Convert a relative filesystem path into an archive entry name
pub fn entry_name(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => {
                return Err(SitepackError::InvalidEntryName(
                    relative.display().to_string(),
                ))
            }
        }
    }
    if parts.is_empty() {
        return Err(SitepackError::InvalidEntryName(String::new()));
    }
    Ok(parts.join("/"))
}

/// Convert an archive entry name back into a relative path
///
/// Rejects absolute names and any name containing a `..` segment, so no
/// entry can escape the restore root.
pub fn sanitized_relative_path(name: &str) -> Result<PathBuf> {
    if name.starts_with('/') || name.contains('\\') {
        return Err(SitepackError::InvalidEntryName(name.to_string()));
    }
    let mut path = PathBuf::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(SitepackError::InvalidEntryName(name.to_string())),
            part => path.push(part),
        }
    }
    if path.as_os_str().is_empty() {
        return Err(SitepackError::InvalidEntryName(name.to_string()));
    }
    Ok(path)
}
