//! Main Sitepack implementation
//!
//! This module provides the core [`Sitepack`] struct driving the two
//! long-running operations:
//!
//! - **Export** (snapshot): walk the application root, stream every
//!   included file into a fresh timestamped archive, append the database
//!   dump script and the environment descriptor, close the archive.
//! - **Import** (restore): stream every archive entry back under the
//!   application root, buffer the dump script and descriptor, then rewrite
//!   origin URLs and reload the database.
//!
//! Both operations are single-threaded sequences of blocking I/O steps.
//! Per-file and per-statement errors are recovered locally (logged and
//! skipped); errors that prevent establishing the operation itself abort
//! immediately. Two operations must not run concurrently against the same
//! root and database; callers serialize invocations externally.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use sitepack::{Sitepack, SitepackBuilder, EnvDescriptor, ImportSource};
//! use std::path::PathBuf;
//!
//! # fn main() -> sitepack::Result<()> {
//! let conn = rusqlite::Connection::open("site.db")?;
//! let pack = SitepackBuilder::new()
//!     .site_urls(EnvDescriptor::new("https://origin.example", "https://origin.example"))
//!     .build(
//!         PathBuf::from("./site"),
//!         PathBuf::from("./.sitepack"),
//!         conn,
//!     )?;
//!
//! let report = pack.export()?;
//! println!("archived {} files into {}", report.files_added, report.archive_name);
//!
//! let restore = pack.import(ImportSource::Backup(report.archive_name))?;
//! println!("restored {} files", restore.files_restored);
//! # Ok(())
//! # }
//! ```

use chrono::Local;
use rusqlite::Connection;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::archive::{entry_name, sanitized_relative_path, ArchiveReader, ArchiveWriter};
use crate::dump;
use crate::error::{Result, SitepackError};
use crate::logger::{ActionLog, FileLog};
use crate::rewrite::{rewrite_script, EnvDescriptor};
use crate::store::{ArchiveStore, DirectoryStore};
use crate::types::{
    BackupInfo, ExportReport, ImportReport, ImportSource, SitepackConfig, ARCHIVE_PREFIX,
    ARCHIVE_TIMESTAMP_FORMAT, DEFAULT_CONFIG_FILENAME, DEFAULT_RESERVED_TABLE,
    DUMP_SCRIPT_EXTENSION, ENV_DESCRIPTOR_ENTRY,
};
use crate::walker::TreeWalker;

/// Snapshot/restore orchestrator for one application instance
///
/// Owns the database connection and the injected [`ActionLog`] and
/// [`ArchiveStore`] capabilities; never touches a fixed path beyond the
/// configured application root.
pub struct Sitepack {
    conn: Connection,
    store: Arc<dyn ArchiveStore>,
    log: Arc<dyn ActionLog>,
    config: SitepackConfig,
}

impl std::fmt::Debug for Sitepack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sitepack")
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`Sitepack`] with custom configuration
#[derive(Default)]
pub struct SitepackBuilder {
    config_filename: Option<String>,
    reserved_table: Option<String>,
    denylist: HashSet<PathBuf>,
    excluded_paths: Vec<PathBuf>,
    site_urls: EnvDescriptor,
    log: Option<Arc<dyn ActionLog>>,
    store: Option<Arc<dyn ArchiveStore>>,
}

impl SitepackBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the environment configuration file excluded from snapshots
    /// and never overwritten by a restore (default `site-config.php`)
    pub fn reserved_config_file(mut self, filename: impl Into<String>) -> Self {
        self.config_filename = Some(filename.into());
        self
    }

    /// Name of the settings table that is never dumped and never dropped
    /// (default `options`)
    pub fn reserved_table(mut self, table: impl Into<String>) -> Self {
        self.reserved_table = Some(table.into());
        self
    }

    /// Exact relative paths to exclude from snapshots (the known
    /// problematic file mechanism)
    pub fn denylist(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.denylist = paths.into_iter().collect();
        self
    }

    /// Exclude everything under an additional absolute path
    pub fn exclude_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_paths.push(path.into());
        self
    }

    /// This instance's own public base URLs
    pub fn site_urls(mut self, urls: EnvDescriptor) -> Self {
        self.site_urls = urls;
        self
    }

    /// Inject a custom action log (default: `actions.log` in the working
    /// directory)
    pub fn action_log(mut self, log: Arc<dyn ActionLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Inject a custom archive store (default: `backups/` in the working
    /// directory)
    pub fn archive_store(mut self, store: Arc<dyn ArchiveStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build a [`Sitepack`] for an application root and working directory
    ///
    /// The root must exist. The working directory is created if needed and
    /// is always excluded from traversal, so prior archives and logs never
    /// end up inside a snapshot.
    pub fn build(
        self,
        root_path: PathBuf,
        work_dir: PathBuf,
        conn: Connection,
    ) -> Result<Sitepack> {
        let root_path = fs::canonicalize(&root_path).map_err(|e| {
            SitepackError::validation(format!(
                "application root {} is not accessible: {e}",
                root_path.display()
            ))
        })?;
        fs::create_dir_all(&work_dir)?;
        let work_dir = fs::canonicalize(work_dir)?;

        let store: Arc<dyn ArchiveStore> = match self.store {
            Some(store) => store,
            None => Arc::new(DirectoryStore::new(work_dir.join("backups"))?),
        };
        let log: Arc<dyn ActionLog> = match self.log {
            Some(log) => log,
            None => Arc::new(FileLog::new(work_dir.join("actions.log"))),
        };

        let mut excluded_paths = self.excluded_paths;
        excluded_paths.push(work_dir);

        let config = SitepackConfig {
            root_path,
            config_filename: self
                .config_filename
                .unwrap_or_else(|| DEFAULT_CONFIG_FILENAME.to_string()),
            reserved_table: self
                .reserved_table
                .unwrap_or_else(|| DEFAULT_RESERVED_TABLE.to_string()),
            denylist: self.denylist,
            excluded_paths,
            site_urls: self.site_urls,
        };

        Ok(Sitepack {
            conn,
            store,
            log,
            config,
        })
    }
}

impl Sitepack {
    /// Start configuring a new instance
    pub fn builder() -> SitepackBuilder {
        SitepackBuilder::new()
    }

    /// The active configuration
    pub fn config(&self) -> &SitepackConfig {
        &self.config
    }

    /// Snapshot the application into a fresh archive
    ///
    /// Walks the application root and streams every included file into the
    /// archive, then appends the dump script and environment descriptor
    /// entries and closes the container. A single file's failure is logged
    /// and skipped, as is a site file whose name is reserved for a manifest
    /// entry; failing to create the archive or to enumerate tables aborts
    /// the run (a partial archive file may remain). The action log is
    /// cleared first so it describes this run only.
    #[instrument(skip_all)]
    pub fn export(&self) -> Result<ExportReport> {
        let stamp = Local::now().format(ARCHIVE_TIMESTAMP_FORMAT).to_string();
        let archive_name = format!("{ARCHIVE_PREFIX}{stamp}.zip");
        let script_name = format!("{ARCHIVE_PREFIX}{stamp}.{DUMP_SCRIPT_EXTENSION}");
        self.log.clear();
        self.log.append(&format!("Export started: {archive_name}"));

        let path = self
            .store
            .create(&archive_name)
            .map_err(|e| self.fatal("Could not create archive", e))?;
        let mut writer =
            ArchiveWriter::create(&path).map_err(|e| self.fatal("Could not create archive", e))?;

        let walker = TreeWalker::new(&self.config.root_path)
            .with_reserved_filename(self.config.config_filename.clone())
            .with_denylist(self.config.denylist.clone())
            .with_excluded_paths(self.config.excluded_paths.clone());

        let mut files_added = 0;
        let mut files_skipped = 0;
        for (relative, absolute) in walker.walk() {
            let name = match entry_name(&relative) {
                Ok(name) => name,
                Err(e) => {
                    self.log
                        .append(&format!("Skipped file {}: {e}", relative.display()));
                    files_skipped += 1;
                    continue;
                }
            };
            if is_manifest_name(&name) {
                warn!(file = %name, "site file shadows a manifest entry name, skipping");
                self.log
                    .append(&format!("Skipped file {name}: name reserved for a manifest entry"));
                files_skipped += 1;
                continue;
            }
            let added = File::open(&absolute)
                .map_err(SitepackError::from)
                .and_then(|file| writer.add_file(&name, file));
            match added {
                Ok(_) => {
                    self.log.append(&format!("Added file to archive: {name}"));
                    files_added += 1;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "failed to add file, skipping");
                    self.log.append(&format!("Skipped file {name}: {e}"));
                    files_skipped += 1;
                }
            }
        }

        let excluded = HashSet::from([self.config.reserved_table.clone()]);
        let script = dump::dump(&self.conn, &excluded)
            .map_err(|e| self.fatal("Database dump failed", e))?;
        for table in &script.tables {
            self.log
                .append(&format!("Added table to dump script: {table}"));
        }
        writer
            .add_bytes(&script_name, script.text.as_bytes())
            .map_err(|e| self.fatal("Could not write dump script entry", e))?;
        self.log.append(&format!("Added dump script: {script_name}"));

        writer
            .add_bytes(
                ENV_DESCRIPTOR_ENTRY,
                self.config.site_urls.render().as_bytes(),
            )
            .map_err(|e| self.fatal("Could not write environment descriptor entry", e))?;
        self.log.append("Added environment descriptor.");

        writer
            .finish()
            .map_err(|e| self.fatal("Could not finalize archive", e))?;
        self.log.append("Export completed successfully.");
        info!(
            archive = %archive_name,
            files = files_added,
            skipped = files_skipped,
            "export complete"
        );

        Ok(ExportReport {
            archive_name,
            files_added,
            files_skipped,
            script_bytes: script.text.len(),
            tables_dumped: script.tables,
        })
    }

    /// Restore the application from an archive
    ///
    /// Accepts either uploaded archive bytes (persisted into the store
    /// first) or the name of an existing backup. Every entry except the
    /// reserved configuration file is classified by name: a root-level
    /// dump script of the generated name shape and the environment
    /// descriptor are buffered, everything else (including ordinary `.sql`
    /// site files) is written under the application root as it streams by.
    /// After the archive is fully consumed, the buffered script is
    /// rewritten against this instance's base URL and executed. The action
    /// log is cleared first so it describes this run only; the returned
    /// action list is ordered most recent first.
    #[instrument(skip_all)]
    pub fn import(&self, source: ImportSource) -> Result<ImportReport> {
        self.log.clear();
        let mut actions = Vec::new();

        let archive_name = match source {
            ImportSource::Backup(name) => {
                if name.trim().is_empty() {
                    return Err(self.fatal(
                        "No import source supplied",
                        SitepackError::validation("empty backup name"),
                    ));
                }
                name
            }
            ImportSource::Upload { file_name, payload } => {
                if file_name.trim().is_empty() {
                    return Err(self.fatal(
                        "No import source supplied",
                        SitepackError::validation("uploaded archive has no name"),
                    ));
                }
                self.store
                    .save_upload(&file_name, &mut payload.as_slice())
                    .map_err(|e| self.fatal("Could not store uploaded archive", e))?;
                self.record(&mut actions, format!("Stored uploaded archive: {file_name}"));
                file_name
            }
        };
        self.record(&mut actions, format!("Import started: {archive_name}"));

        let path = self
            .store
            .resolve(&archive_name)
            .map_err(|e| self.fatal("Could not open archive", e))?;
        let mut reader =
            ArchiveReader::open(&path).map_err(|e| self.fatal("Could not open archive", e))?;
        let entries = reader
            .entries()
            .map_err(|e| self.fatal("Could not list archive entries", e))?;

        let mut script: Option<String> = None;
        let mut descriptor: Option<EnvDescriptor> = None;
        let mut files_restored = 0;
        let mut entries_skipped = 0;

        for entry in entries {
            let name = entry.name;
            if name.ends_with('/') {
                // Directory placeholder entries carry no bytes.
                continue;
            }
            let base = name.rsplit('/').next().unwrap_or(name.as_str());
            if base == self.config.config_filename {
                self.record(
                    &mut actions,
                    format!("Skipped reserved configuration file: {name}"),
                );
                continue;
            }
            if name == ENV_DESCRIPTOR_ENTRY {
                match reader
                    .read_entry_to_string(&name)
                    .and_then(|text| EnvDescriptor::parse(&text))
                {
                    Ok(parsed) => {
                        self.record(&mut actions, "Read environment descriptor.".to_string());
                        descriptor = Some(parsed);
                    }
                    Err(e) => {
                        self.record(
                            &mut actions,
                            format!("Error reading environment descriptor: {e}"),
                        );
                        entries_skipped += 1;
                    }
                }
                continue;
            }
            if is_dump_script_name(&name) {
                match reader.read_entry_to_string(&name) {
                    Ok(text) => {
                        self.record(&mut actions, format!("Buffered dump script: {name}"));
                        script = Some(text);
                    }
                    Err(e) => {
                        self.record(&mut actions, format!("Error reading dump script {name}: {e}"));
                        entries_skipped += 1;
                    }
                }
                continue;
            }
            match self.restore_file(&mut reader, &name) {
                Ok(()) => {
                    self.record(&mut actions, format!("Extracted: {name}"));
                    files_restored += 1;
                }
                Err(e) => {
                    warn!(entry = %name, error = %e, "failed to extract entry, skipping");
                    self.record(&mut actions, format!("Error extracting {name}: {e}"));
                    entries_skipped += 1;
                }
            }
        }

        let excluded = HashSet::from([self.config.reserved_table.clone()]);
        let mut load = dump::LoadReport::default();
        match script {
            Some(text) => {
                let rewritten = match &descriptor {
                    Some(origin) => {
                        rewrite_script(&text, origin, &self.config.site_urls.siteurl)
                    }
                    None => {
                        self.record(
                            &mut actions,
                            "No environment descriptor found; dump script left unrewritten."
                                .to_string(),
                        );
                        text
                    }
                };
                load = dump::load(&self.conn, &rewritten, &excluded)
                    .map_err(|e| self.fatal("Dump script load failed", e))?;
                for line in &load.actions {
                    self.record(&mut actions, line.clone());
                }
                self.record(&mut actions, "Dump script imported.".to_string());
            }
            None => {
                // Not fatal: a file-only archive is still a usable restore.
                self.record(&mut actions, "Dump script not found in archive.".to_string());
            }
        }
        self.record(&mut actions, format!("Import completed: {archive_name}"));
        info!(
            archive = %archive_name,
            files = files_restored,
            statements = load.statements_executed,
            failed = load.failures.len(),
            "import complete"
        );

        actions.reverse();
        Ok(ImportReport {
            archive_name,
            files_restored,
            entries_skipped,
            tables_dropped: load.tables_dropped,
            statements_executed: load.statements_executed,
            statements_failed: load.failures.len(),
            actions,
        })
    }

    /// Current archives in the backup store
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        self.store.list()
    }

    /// Delete one archive by name
    pub fn delete_backup(&self, name: &str) -> Result<()> {
        self.store.delete(name)?;
        self.log.append(&format!("Backup deleted: {name}"));
        Ok(())
    }

    /// Discard the action log contents
    pub fn clear_log(&self) {
        self.log.clear();
    }

    fn restore_file(&self, reader: &mut ArchiveReader, name: &str) -> Result<()> {
        let relative = sanitized_relative_path(name)?;
        let destination = self.config.root_path.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&destination)?;
        reader.extract_entry(name, &mut file)?;
        Ok(())
    }

    fn record(&self, actions: &mut Vec<String>, message: String) {
        self.log.append(&message);
        actions.push(message);
    }

    fn fatal(&self, context: &str, error: SitepackError) -> SitepackError {
        warn!(error = %error, context, "operation aborted");
        self.log.append(&format!("{context}: {error}"));
        error
    }
}

/// Entry names reserved for the snapshot manifest: the environment
/// descriptor and any root-level dump script of the generated name shape.
///
/// Export skips site files carrying these names (a recovered, logged skip)
/// so a snapshot can always be produced; import buffers matching entries
/// instead of writing them under the root. Ordinary `.sql` site files and
/// nested files of any name are outside this namespace.
fn is_manifest_name(name: &str) -> bool {
    name == ENV_DESCRIPTOR_ENTRY || is_dump_script_name(name)
}

fn is_dump_script_name(name: &str) -> bool {
    !name.contains('/')
        && name.starts_with(ARCHIVE_PREFIX)
        && Path::new(name).extension().and_then(|ext| ext.to_str()) == Some(DUMP_SCRIPT_EXTENSION)
}
