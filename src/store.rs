//! Injected archive store capability
//!
//! The set of backups is simply a directory's current contents; there is no
//! separate index. The core lists, opens, creates and deletes archives only
//! through the [`ArchiveStore`] trait so that it never touches a fixed
//! path and tests can point it at a temporary directory.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SitepackError};
use crate::types::BackupInfo;

/// List/open/create/delete archives by name
pub trait ArchiveStore: Send + Sync {
    /// Reserve a path for a new archive; fails if an archive with that
    /// name already exists, so a snapshot run never overwrites a prior one
    fn create(&self, name: &str) -> Result<PathBuf>;

    /// Resolve the path of an existing archive; `NotFound` if absent
    fn resolve(&self, name: &str) -> Result<PathBuf>;

    /// Current archives, as found on disk right now
    fn list(&self) -> Result<Vec<BackupInfo>>;

    /// Delete one archive by name
    fn delete(&self, name: &str) -> Result<()>;

    /// Persist an uploaded archive into the store and return its path
    fn save_upload(&self, name: &str, payload: &mut dyn Read) -> Result<PathBuf>;
}

/// Archive store backed by one flat directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// Create a store over `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the archives
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reject names that could resolve outside the store directory
    fn checked_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name == "."
            || name == ".."
        {
            return Err(SitepackError::validation(format!(
                "invalid backup name: {name:?}"
            )));
        }
        Ok(self.dir.join(name))
    }
}

impl ArchiveStore for DirectoryStore {
    fn create(&self, name: &str) -> Result<PathBuf> {
        let path = self.checked_path(name)?;
        if path.exists() {
            return Err(SitepackError::validation(format!(
                "backup {name} already exists"
            )));
        }
        debug!(name, "reserved archive path");
        Ok(path)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let path = self.checked_path(name)?;
        if !path.is_file() {
            return Err(SitepackError::not_found(format!("backup {name}")));
        }
        Ok(path)
    }

    fn list(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            backups.push(BackupInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: entry.metadata()?.len(),
            });
        }
        backups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(backups)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::remove_file(&path)?;
        info!(name, "deleted backup");
        Ok(())
    }

    fn save_upload(&self, name: &str, payload: &mut dyn Read) -> Result<PathBuf> {
        let path = self.checked_path(name)?;
        let mut file = File::create(&path)?;
        let bytes = io::copy(payload, &mut file)?;
        info!(name, bytes, "stored uploaded archive");
        Ok(path)
    }
}
