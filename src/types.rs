//! Core data types used throughout the sitepack library
//!
//! This module contains the shared configuration, the operation reports
//! returned by the orchestrators, and the lexical constants of the archive
//! and dump script formats.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::rewrite::EnvDescriptor;

/// Prefix of generated archive (and dump script) names
pub const ARCHIVE_PREFIX: &str = "sitepack-export-";

/// Timestamp format embedded in archive names; seconds resolution keeps
/// names of runs more than one second apart distinct
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Name of the environment descriptor entry inside every snapshot
pub const ENV_DESCRIPTOR_ENTRY: &str = "url_data.txt";

/// File extension marking the dump script entry inside a snapshot
pub const DUMP_SCRIPT_EXTENSION: &str = "sql";

/// Statement terminator of the dump script grammar; also the split point
/// when a script is loaded back
pub const STATEMENT_TERMINATOR: &str = ";\n";

/// Default name of the reserved settings table that is never dumped and
/// never dropped on restore
pub const DEFAULT_RESERVED_TABLE: &str = "options";

/// Default name of the environment configuration file excluded from every
/// snapshot and never overwritten by a restore
pub const DEFAULT_CONFIG_FILENAME: &str = "site-config.php";

/// Engine configuration shared by the snapshot and restore orchestrators
#[derive(Debug, Clone)]
pub struct SitepackConfig {
    /// Application root directory captured by snapshots and written to by
    /// restores
    pub root_path: PathBuf,
    /// Reserved configuration filename, matched by basename in any
    /// directory
    pub config_filename: String,
    /// Reserved settings table preserved across migrations
    pub reserved_table: String,
    /// Operator-provided denylist of exact relative paths to exclude
    pub denylist: HashSet<PathBuf>,
    /// Absolute path prefixes excluded from traversal (the engine's own
    /// working directory, prior archives, logs)
    pub excluded_paths: Vec<PathBuf>,
    /// This instance's own public base URLs; written into the descriptor
    /// on export, used as the rewrite destination on import
    pub site_urls: EnvDescriptor,
}

/// Result of one snapshot run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    /// Name of the archive produced by this run
    pub archive_name: String,
    /// Number of files added to the archive
    pub files_added: usize,
    /// Number of files skipped after a recovered per-file error
    pub files_skipped: usize,
    /// Tables serialized into the dump script, in enumeration order
    pub tables_dumped: Vec<String>,
    /// Size of the generated dump script in bytes
    pub script_bytes: usize,
}

/// Result of one restore run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    /// Name of the archive consumed by this run
    pub archive_name: String,
    /// Number of file entries written under the application root
    pub files_restored: usize,
    /// Number of entries skipped after a recovered per-entry error
    pub entries_skipped: usize,
    /// Tables dropped before the dump script was executed
    pub tables_dropped: Vec<String>,
    /// Number of dump statements that executed successfully
    pub statements_executed: usize,
    /// Number of dump statements that failed and were skipped
    pub statements_failed: usize,
    /// Human-readable action log of the run, most recent action first
    pub actions: Vec<String>,
}

/// One archive in the backup store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    /// Archive file name
    pub name: String,
    /// Archive size in bytes
    pub size: u64,
}

/// Source of a restore run: either bytes uploaded by the operator or the
/// name of an existing backup in the store
#[derive(Debug)]
pub enum ImportSource {
    /// An archive already present in the backup store
    Backup(String),
    /// Uploaded archive bytes; persisted into the store before the restore
    /// begins so the upload becomes a listed backup
    Upload {
        /// File name to store the upload under
        file_name: String,
        /// Raw archive bytes
        payload: Vec<u8>,
    },
}
