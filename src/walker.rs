//! Filesystem tree walker
//!
//! Enumerates the application root lazily, yielding only terminal files as
//! `(relative, absolute)` path pairs. Three exclusion rules are applied per
//! candidate, in order:
//!
//! 1. paths inside the engine's own working/output directory (prevents a
//!    snapshot from swallowing prior archives and logs),
//! 2. the reserved environment configuration file, matched by basename in
//!    any directory,
//! 3. an operator-provided denylist of exact relative paths.
//!
//! Exclusions are logged with their reason and are not errors. Symlinks are
//! not followed, so cyclic links cannot loop the traversal. An unreadable
//! entry is logged and skipped; the walk continues.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Lazy enumerator of an application tree
#[derive(Debug)]
pub struct TreeWalker {
    root: PathBuf,
    reserved_filename: Option<OsString>,
    denylist: HashSet<PathBuf>,
    excluded_paths: Vec<PathBuf>,
}

impl TreeWalker {
    /// Create a walker over `root` with no exclusions
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reserved_filename: None,
            denylist: HashSet::new(),
            excluded_paths: Vec::new(),
        }
    }

    /// Exclude one reserved filename, matched in any directory
    pub fn with_reserved_filename(mut self, filename: impl Into<OsString>) -> Self {
        self.reserved_filename = Some(filename.into());
        self
    }

    /// Exclude an exact set of relative paths
    pub fn with_denylist(mut self, denylist: HashSet<PathBuf>) -> Self {
        self.denylist = denylist;
        self
    }

    /// Exclude everything under the given absolute path prefixes
    pub fn with_excluded_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.excluded_paths = paths;
        self
    }

    /// Walk the tree, yielding `(relative_path, absolute_path)` per file
    ///
    /// The sequence is finite and computed lazily; re-invoke `walk` to
    /// restart. Traversal order is unspecified.
    pub fn walk(&self) -> impl Iterator<Item = (PathBuf, PathBuf)> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable entry during traversal");
                        return None;
                    }
                };
                if !entry.file_type().is_file() {
                    return None;
                }
                let absolute = entry.path().to_path_buf();
                self.accept(&absolute, entry.file_name())
                    .map(|relative| (relative, absolute))
            })
    }

    /// Apply the exclusion rules; `Some(relative)` if the file is included
    fn accept(&self, absolute: &Path, file_name: &std::ffi::OsStr) -> Option<PathBuf> {
        if self
            .excluded_paths
            .iter()
            .any(|prefix| absolute.starts_with(prefix))
        {
            debug!(path = %absolute.display(), "excluded: inside engine working directory");
            return None;
        }
        if let Some(reserved) = &self.reserved_filename {
            if file_name == reserved.as_os_str() {
                debug!(path = %absolute.display(), "excluded: reserved configuration file");
                return None;
            }
        }
        let relative = absolute.strip_prefix(&self.root).ok()?.to_path_buf();
        if self.denylist.contains(&relative) {
            debug!(path = %relative.display(), "excluded: denylisted path");
            return None;
        }
        Some(relative)
    }
}
