//! # Sitepack CLI
//!
//! Command-line trigger surface for the snapshot/restore engine.
//!
//! ## Usage
//! ```bash
//! # Snapshot the site into a fresh archive
//! sitepack --root ./site --database site.db export
//!
//! # Restore from an existing backup
//! sitepack --root ./site --database site.db import --backup sitepack-export-2026-08-23_10-00-00.zip
//!
//! # Restore from an archive file outside the store
//! sitepack --root ./site --database site.db import --archive /tmp/site.zip
//!
//! # Manage backups and the action log
//! sitepack --root ./site --database site.db list
//! sitepack --root ./site --database site.db delete <name>
//! sitepack --root ./site --database site.db clear-log
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sitepack::{EnvDescriptor, ImportSource, Result, SitepackBuilder, SitepackError};

/// Sitepack - snapshot and restore a site's files and database
#[derive(Parser)]
#[command(name = "sitepack")]
#[command(version)]
#[command(about = "Pack a site's files and database into one portable archive, and restore it")]
struct Cli {
    /// Application root directory
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Working directory for backups and the action log
    #[arg(short, long, default_value = ".sitepack")]
    work_dir: PathBuf,

    /// SQLite database file of the application
    #[arg(short, long)]
    database: PathBuf,

    /// Public base URL of this instance
    #[arg(long, default_value = "")]
    site_url: String,

    /// Public home URL (defaults to the site URL)
    #[arg(long)]
    home_url: Option<String>,

    /// Reserved configuration filename excluded from snapshots
    #[arg(long, default_value = "site-config.php")]
    config_file: String,

    /// Reserved settings table preserved across restores
    #[arg(long, default_value = "options")]
    reserved_table: String,

    /// Relative paths to exclude from snapshots
    #[arg(long = "exclude")]
    denylist: Vec<PathBuf>,

    /// Emit reports as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot the application into a fresh archive
    Export,

    /// Restore the application from an archive
    Import {
        /// Archive file to upload into the store and restore from
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Name of an existing backup in the store
        #[arg(long)]
        backup: Option<String>,
    },

    /// List existing backups
    List,

    /// Delete one backup by name
    Delete {
        /// Backup name
        name: String,
    },

    /// Clear the action log
    ClearLog,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let home_url = cli.home_url.clone().unwrap_or_else(|| cli.site_url.clone());
    let conn = rusqlite::Connection::open(&cli.database)?;
    let pack = SitepackBuilder::new()
        .reserved_config_file(cli.config_file.clone())
        .reserved_table(cli.reserved_table.clone())
        .denylist(cli.denylist.clone())
        .site_urls(EnvDescriptor::new(cli.site_url.clone(), home_url))
        .build(cli.root.clone(), cli.work_dir.clone(), conn)?;

    match cli.command {
        Commands::Export => {
            let report = pack.export()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} {}", "Created".green().bold(), report.archive_name);
                println!(
                    "  {} files archived, {} skipped",
                    report.files_added, report.files_skipped
                );
                println!(
                    "  {} tables dumped ({} bytes of script)",
                    report.tables_dumped.len(),
                    report.script_bytes
                );
            }
        }
        Commands::Import { archive, backup } => {
            let source = match (archive, backup) {
                (Some(path), None) => {
                    let file_name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .ok_or_else(|| {
                            SitepackError::validation("archive path has no file name")
                        })?;
                    let payload = std::fs::read(&path)?;
                    ImportSource::Upload { file_name, payload }
                }
                (None, Some(name)) => ImportSource::Backup(name),
                (Some(_), Some(_)) => {
                    return Err(SitepackError::validation(
                        "supply either --archive or --backup, not both",
                    ))
                }
                (None, None) => {
                    return Err(SitepackError::validation(
                        "no import source supplied; use --archive or --backup",
                    ))
                }
            };
            let report = pack.import(source)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} {}", "Restored".green().bold(), report.archive_name);
                println!(
                    "  {} files restored, {} entries skipped",
                    report.files_restored, report.entries_skipped
                );
                println!(
                    "  {} statements executed, {} failed",
                    report.statements_executed, report.statements_failed
                );
                for line in &report.actions {
                    println!("  {line}");
                }
            }
        }
        Commands::List => {
            let backups = pack.list_backups()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
            } else if backups.is_empty() {
                println!("{}", "No backups found.".yellow());
            } else {
                for backup in backups {
                    println!("{:>12}  {}", backup.size, backup.name.bold());
                }
            }
        }
        Commands::Delete { name } => {
            pack.delete_backup(&name)?;
            println!("{} {}", "Deleted".red().bold(), name);
        }
        Commands::ClearLog => {
            pack.clear_log();
            println!("{}", "Action log cleared.".bold());
        }
    }

    Ok(())
}
