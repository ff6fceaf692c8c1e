//! Integration tests for sitepack
//!
//! Full snapshot/restore scenarios: tree and table round-trips across two
//! instances with different base URLs, partial-failure tolerance, and
//! backup store behavior.

use rusqlite::Connection;
use ::sitepack::dump::table_rows;
use ::sitepack::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// One application instance under test: a root tree, a working directory,
/// a file-backed database and a Sitepack over them
pub struct SiteFixture {
    pub root: TempDir,
    pub work: TempDir,
    pub db_path: PathBuf,
    pub pack: Sitepack,
    pub log: Arc<MemoryLog>,
}

impl SiteFixture {
    pub fn new(siteurl: &str, denylist: Vec<PathBuf>) -> Self {
        let root = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        // The database file lives in the working directory so the walker
        // never sweeps it into an archive.
        let db_path = work.path().join("site.db");
        let conn = Connection::open(&db_path).unwrap();
        let log = Arc::new(MemoryLog::new());
        let pack = SitepackBuilder::new()
            .reserved_config_file("site-config.php")
            .reserved_table("options")
            .denylist(denylist)
            .site_urls(EnvDescriptor::new(siteurl, siteurl))
            .action_log(log.clone())
            .build(
                root.path().to_path_buf(),
                work.path().to_path_buf(),
                conn,
            )
            .unwrap();
        Self {
            root,
            work,
            db_path,
            pack,
            log,
        }
    }

    pub fn archive_bytes(&self, name: &str) -> Vec<u8> {
        fs::read(self.work.path().join("backups").join(name)).unwrap()
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<RowValue>> {
        let conn = Connection::open(&self.db_path).unwrap();
        table_rows(&conn, table).unwrap()
    }

    pub fn table_names(&self) -> Vec<String> {
        let conn = Connection::open(&self.db_path).unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        names
    }

    pub fn execute_batch(&self, sql: &str) {
        Connection::open(&self.db_path)
            .unwrap()
            .execute_batch(sql)
            .unwrap();
    }
}

fn archive_entry_names(path: &Path) -> Vec<String> {
    let mut reader = ArchiveReader::open(path).unwrap();
    reader
        .entries()
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect()
}

#[test]
fn test_full_roundtrip_between_two_instances() {
    let source = SiteFixture::new("https://old.example", vec![PathBuf::from("uploads/broken.jpg")]);

    // Populate the source tree, including content that must stay out of
    // the snapshot.
    fs::create_dir_all(source.root.path().join("assets")).unwrap();
    fs::create_dir_all(source.root.path().join("uploads")).unwrap();
    fs::write(source.root.path().join("index.html"), b"<html>home</html>").unwrap();
    let binary: Vec<u8> = (0..8192u32)
        .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
        .collect();
    fs::write(source.root.path().join("assets/data.bin"), &binary).unwrap();
    fs::write(source.root.path().join("site-config.php"), b"<?php secret();").unwrap();
    fs::write(source.root.path().join("uploads/broken.jpg"), b"bad").unwrap();

    source.execute_batch(
        "CREATE TABLE posts (id INTEGER, title TEXT, link TEXT);
         CREATE TABLE options (name TEXT, value TEXT);
         INSERT INTO posts VALUES (1, 'welcome', 'https://old.example/post/1');
         INSERT INTO posts VALUES (2, 'null body', NULL);
         INSERT INTO options VALUES ('siteurl', 'https://old.example');",
    );

    let export = source.pack.export().unwrap();
    assert_eq!(export.files_added, 2);
    assert_eq!(export.files_skipped, 0);
    assert_eq!(export.tables_dumped, vec!["posts".to_string()]);

    // Excluded content must be absent from the archive itself.
    let archive_path = source
        .work
        .path()
        .join("backups")
        .join(&export.archive_name);
    let names = archive_entry_names(&archive_path);
    assert!(names.contains(&"index.html".to_string()));
    assert!(names.contains(&"assets/data.bin".to_string()));
    assert!(names.contains(&ENV_DESCRIPTOR_ENTRY.to_string()));
    assert!(!names.iter().any(|n| n.contains("site-config.php")));
    assert!(!names.iter().any(|n| n.contains("broken.jpg")));

    // Restore on a second instance with a different base URL, pre-seeded
    // with its own settings and a stale table.
    let destination = SiteFixture::new("https://new.example", vec![]);
    destination.execute_batch(
        "CREATE TABLE options (name TEXT, value TEXT);
         CREATE TABLE legacy (junk TEXT);
         INSERT INTO options VALUES ('siteurl', 'https://new.example');",
    );

    let payload = source.archive_bytes(&export.archive_name);
    let import = destination
        .pack
        .import(ImportSource::Upload {
            file_name: export.archive_name.clone(),
            payload,
        })
        .unwrap();

    assert_eq!(import.files_restored, 2);
    assert_eq!(import.entries_skipped, 0);
    assert_eq!(import.statements_failed, 0);
    assert!(import.tables_dropped.contains(&"legacy".to_string()));
    // The action list is most-recent-first.
    assert!(import.actions[0].starts_with("Import completed"));

    // Tree round-trip: byte-identical content at identical relative paths.
    assert_eq!(
        fs::read(destination.root.path().join("index.html")).unwrap(),
        b"<html>home</html>"
    );
    assert_eq!(
        fs::read(destination.root.path().join("assets/data.bin")).unwrap(),
        binary
    );
    assert!(!destination.root.path().join("site-config.php").exists());
    assert!(!destination.root.path().join("uploads/broken.jpg").exists());
    // The descriptor is consumed, never written to disk.
    assert!(!destination.root.path().join(ENV_DESCRIPTOR_ENTRY).exists());

    // Table round-trip with the origin URL rewritten to the destination.
    assert_eq!(
        destination.rows("posts"),
        vec![
            vec![
                RowValue::Text("1".to_string()),
                RowValue::Text("welcome".to_string()),
                RowValue::Text("https://new.example/post/1".to_string()),
            ],
            vec![
                RowValue::Text("2".to_string()),
                RowValue::Text("null body".to_string()),
                RowValue::Null,
            ],
        ]
    );

    // The reserved table kept the destination's own identity, and the
    // stale table is gone.
    assert_eq!(
        destination.rows("options"),
        vec![vec![
            RowValue::Text("siteurl".to_string()),
            RowValue::Text("https://new.example".to_string()),
        ]]
    );
    assert_eq!(
        destination.table_names(),
        vec!["options".to_string(), "posts".to_string()]
    );

    // The uploaded archive became a listed backup on the destination.
    let backups = destination.pack.list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].name, export.archive_name);
}

#[cfg(unix)]
#[test]
fn test_export_tolerates_one_unreadable_file() {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    let fixture = SiteFixture::new("https://site.example", vec![]);
    fs::write(fixture.root.path().join("readable-a.txt"), b"a").unwrap();
    fs::write(fixture.root.path().join("readable-b.txt"), b"b").unwrap();
    let locked = fixture.root.path().join("locked.txt");
    fs::write(&locked, b"secret").unwrap();
    fs::set_permissions(&locked, Permissions::from_mode(0o000)).unwrap();

    if fs::File::open(&locked).is_ok() {
        // Running as root: permission bits are not enforced, so the
        // scenario cannot be produced. Nothing to assert.
        return;
    }

    let report = fixture.pack.export().unwrap();
    assert_eq!(report.files_added, 2);
    assert_eq!(report.files_skipped, 1);

    let skips = fixture
        .log
        .lines()
        .iter()
        .filter(|line| line.starts_with("Skipped file"))
        .count();
    assert_eq!(skips, 1);
}

#[test]
fn test_archive_names_are_unique_across_runs() {
    let fixture = SiteFixture::new("https://site.example", vec![]);
    fs::write(fixture.root.path().join("page.html"), b"x").unwrap();

    let first = fixture.pack.export().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let second = fixture.pack.export().unwrap();

    assert_ne!(first.archive_name, second.archive_name);
    assert_eq!(fixture.pack.list_backups().unwrap().len(), 2);
}

#[test]
fn test_export_skips_site_files_shadowing_manifest_names() {
    let fixture = SiteFixture::new("https://old.example", vec![]);
    // Root-level files carrying the manifest entry names must not abort
    // the snapshot; they are skipped with a logged recovered error.
    fs::write(fixture.root.path().join("url_data.txt"), b"site owned").unwrap();
    fs::write(
        fixture.root.path().join("sitepack-export-2001-01-01_00-00-00.sql"),
        b"-- stale script",
    )
    .unwrap();
    fs::create_dir_all(fixture.root.path().join("notes")).unwrap();
    fs::write(fixture.root.path().join("notes/url_data.txt"), b"nested").unwrap();

    let export = fixture.pack.export().unwrap();
    assert_eq!(export.files_added, 1);
    assert_eq!(export.files_skipped, 2);

    let skips = fixture
        .log
        .lines()
        .iter()
        .filter(|line| line.starts_with("Skipped file") && line.contains("manifest"))
        .count();
    assert_eq!(skips, 2);

    // The descriptor entry holds this instance's URLs, not the site file.
    let path = fixture
        .work
        .path()
        .join("backups")
        .join(&export.archive_name);
    let mut reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(
        reader.read_entry_to_string(ENV_DESCRIPTOR_ENTRY).unwrap(),
        "siteurl=https://old.example\nhome=https://old.example"
    );
    assert!(archive_entry_names(&path).contains(&"notes/url_data.txt".to_string()));
}

#[test]
fn test_site_sql_files_survive_the_roundtrip() {
    let source = SiteFixture::new("https://old.example", vec![]);
    fs::write(source.root.path().join("queries.sql"), b"SELECT 1;").unwrap();
    fs::create_dir_all(source.root.path().join("db")).unwrap();
    fs::write(source.root.path().join("db/schema.sql"), b"-- nested").unwrap();
    source.execute_batch("CREATE TABLE posts (id INTEGER); INSERT INTO posts VALUES (7);");

    let export = source.pack.export().unwrap();
    assert_eq!(export.files_added, 2);

    let destination = SiteFixture::new("https://new.example", vec![]);
    let import = destination
        .pack
        .import(ImportSource::Upload {
            file_name: export.archive_name.clone(),
            payload: source.archive_bytes(&export.archive_name),
        })
        .unwrap();

    // Ordinary .sql files are plain site content and come back intact.
    assert_eq!(import.files_restored, 2);
    assert_eq!(
        fs::read(destination.root.path().join("queries.sql")).unwrap(),
        b"SELECT 1;"
    );
    assert_eq!(
        fs::read(destination.root.path().join("db/schema.sql")).unwrap(),
        b"-- nested"
    );
    // The generated dump script was still recognized and executed.
    assert_eq!(
        destination.rows("posts"),
        vec![vec![RowValue::Text("7".to_string())]]
    );
}

#[test]
fn test_import_without_dump_script_is_logged_not_fatal() {
    let fixture = SiteFixture::new("https://site.example", vec![]);

    // Hand-craft a file-only archive directly in the store.
    let backups = fixture.work.path().join("backups");
    fs::create_dir_all(&backups).unwrap();
    let path = backups.join("files-only.zip");
    let mut writer = ArchiveWriter::create(&path).unwrap();
    writer.add_bytes("notes/readme.txt", b"just files").unwrap();
    writer.finish().unwrap();

    let report = fixture
        .pack
        .import(ImportSource::Backup("files-only.zip".to_string()))
        .unwrap();

    assert_eq!(report.files_restored, 1);
    assert_eq!(report.statements_executed, 0);
    assert!(report
        .actions
        .iter()
        .any(|line| line == "Dump script not found in archive."));
    assert_eq!(
        fs::read(fixture.root.path().join("notes/readme.txt")).unwrap(),
        b"just files"
    );
}

#[test]
fn test_hostile_entry_names_are_skipped_on_restore() {
    let fixture = SiteFixture::new("https://site.example", vec![]);

    let backups = fixture.work.path().join("backups");
    fs::create_dir_all(&backups).unwrap();
    let path = backups.join("hostile.zip");
    let mut writer = ArchiveWriter::create(&path).unwrap();
    writer.add_bytes("../escape.txt", b"outside").unwrap();
    writer.add_bytes("inside.txt", b"inside").unwrap();
    writer.finish().unwrap();

    let report = fixture
        .pack
        .import(ImportSource::Backup("hostile.zip".to_string()))
        .unwrap();

    assert_eq!(report.files_restored, 1);
    assert_eq!(report.entries_skipped, 1);
    assert!(fixture.root.path().join("inside.txt").exists());
    assert!(!fixture.root.path().parent().unwrap().join("escape.txt").exists());
}
