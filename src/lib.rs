//! # Sitepack - whole-application snapshot and restore
//!
//! Sitepack captures a running application's filesystem tree and its
//! relational database into a single portable archive, and reconstructs an
//! equivalent instance from that archive on a possibly different host or
//! URL.
//!
//! ## Overview
//!
//! A snapshot is one zip container holding:
//! - every file under the application root (minus the reserved
//!   configuration file, the engine's own working directory, an operator
//!   denylist, and any root-level site file shadowing a manifest entry
//!   name),
//! - one dump script serializing the database schema and rows, and
//! - one environment descriptor recording the origin's public base URLs.
//!
//! A restore streams the files back under the root, rewrites the origin
//! URL in the dump script to the destination's URL, drops the existing
//! non-reserved tables, and replays the script statement by statement.
//!
//! ## Design choices
//!
//! - **Streaming everywhere**: archive entries can be far larger than
//!   memory; only the dump script and descriptor are buffered.
//! - **Partial-failure tolerance**: a single unreadable file or failing
//!   statement is logged and skipped; the run continues. Only errors that
//!   prevent establishing the operation (archive unreadable, tables not
//!   enumerable, no import source) are fatal.
//! - **Non-atomic load**: the dump reload is deliberately not
//!   transactional so that one malformed statement cannot abort an
//!   otherwise recoverable restore. A crash mid-load leaves a mixed
//!   old/new schema, which callers accept in exchange for maximal
//!   recoverability.
//! - **Preserved local identity**: one reserved settings table is never
//!   dumped and never dropped, so the destination keeps its own URL and
//!   local configuration across a migration.
//! - **Injected capabilities**: the action log and the backup store are
//!   traits ([`ActionLog`], [`ArchiveStore`]); the core never touches a
//!   fixed path, which keeps it testable with in-memory fakes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sitepack::{SitepackBuilder, EnvDescriptor, ImportSource};
//! use std::path::PathBuf;
//!
//! # fn main() -> sitepack::Result<()> {
//! let conn = rusqlite::Connection::open("site.db")?;
//! let pack = SitepackBuilder::new()
//!     .reserved_config_file("site-config.php")
//!     .site_urls(EnvDescriptor::new("https://my.site", "https://my.site"))
//!     .build(PathBuf::from("./site"), PathBuf::from("./.sitepack"), conn)?;
//!
//! // Snapshot the whole application into one archive.
//! let export = pack.export()?;
//!
//! // Later, possibly on another host: restore from it.
//! let import = pack.import(ImportSource::Backup(export.archive_name))?;
//! for line in &import.actions {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Snapshot and restore are each a single-threaded, synchronous sequence
//! of blocking I/O steps. The engine provides no locking; two operations
//! against the same root and database must be serialized by the caller.
//!
//! ## Module Organization
//!
//! - [`archive`]: streaming reader/writer over the zip container
//! - [`walker`]: filesystem traversal with exclusion rules
//! - [`dump`]: database dump/reload engine
//! - [`rewrite`]: environment descriptor and URL rewriting
//! - [`logger`]: injected action log capability
//! - [`store`]: injected backup store capability
//! - [`sitepack`]: the snapshot/restore orchestrators
//! - [`types`]: configuration, reports and format constants
//! - [`error`]: error types and handling

pub mod archive;
pub mod dump;
pub mod error;
pub mod logger;
pub mod rewrite;
pub mod sitepack;
pub mod store;
pub mod types;
pub mod walker;

// Re-export main types for convenience
pub use archive::{ArchiveEntry, ArchiveReader, ArchiveWriter};
pub use dump::{DumpScript, LoadReport, RowValue, StatementFailure};
pub use error::{Result, SitepackError};
pub use logger::{ActionLog, FileLog, MemoryLog};
pub use rewrite::{rewrite_script, EnvDescriptor};
pub use sitepack::{Sitepack, SitepackBuilder};
pub use store::{ArchiveStore, DirectoryStore};
pub use types::*;
pub use walker::TreeWalker;
