//! Archive codec against real directories and a real SQLite database.

use std::path::Path;

use rusqlite::Connection;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use smarticky_backup::archive::{create_archive_bytes, extract_archive};
use smarticky_backup::backup::verify_archive;
use smarticky_backup::checkpoint::{Checkpoint, SqliteCheckpoint};
use smarticky_backup::file_store::{FileStore, LocalFileStore};

fn populate(root: &Path) {
    std::fs::create_dir_all(root.join("uploads/notes/2026")).unwrap();
    std::fs::create_dir_all(root.join("uploads/empty")).unwrap();
    std::fs::write(root.join("uploads/notes/2026/scan.pdf"), vec![7u8; 64 * 1024]).unwrap();
    std::fs::write(root.join("uploads/avatar.png"), b"png").unwrap();
}

#[test]
fn test_directory_tree_survives_roundtrip() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("smarticky.db"), b"db bytes").unwrap();
    populate(source.path());
    std::fs::write(source.path().join("backup_config.json"), b"{}").unwrap();

    let (data, stats) =
        create_archive_bytes(&LocalFileStore::new(source.path()), &CancellationToken::new()).unwrap();
    assert_eq!(stats.bytes, 8 + 64 * 1024 + 3);

    let target = TempDir::new().unwrap();
    let restored = extract_archive(
        &data[..],
        &LocalFileStore::new(target.path()),
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(restored, stats);

    let t = target.path();
    assert_eq!(std::fs::read(t.join("smarticky.db")).unwrap(), b"db bytes");
    assert_eq!(
        std::fs::read(t.join("uploads/notes/2026/scan.pdf")).unwrap(),
        vec![7u8; 64 * 1024]
    );
    assert!(t.join("uploads/empty").is_dir());
    assert!(!t.join("backup_config.json").exists(), "only the database and uploads are archived");
}

#[test]
fn test_checkpointed_wal_database_is_complete_in_archive() {
    let source = TempDir::new().unwrap();
    let db_path = source.path().join("smarticky.db");

    // Keep the writer open so the rows live only in the WAL until checkpointed
    let conn = Connection::open(&db_path).unwrap();
    conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(())).unwrap();
    conn.execute_batch(
        "PRAGMA wal_autocheckpoint=0;
         CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
         INSERT INTO notes (body) VALUES ('first'), ('second'), ('third');",
    )
    .unwrap();

    SqliteCheckpoint::new(&db_path).checkpoint().unwrap();
    let (data, _) =
        create_archive_bytes(&LocalFileStore::new(source.path()), &CancellationToken::new()).unwrap();
    drop(conn);

    let target = TempDir::new().unwrap();
    let store = LocalFileStore::new(target.path());
    extract_archive(&data[..], &store, &CancellationToken::new()).unwrap();
    assert!(!store.exists(Path::new("smarticky.db-wal")));

    let restored = Connection::open(target.path().join("smarticky.db")).unwrap();
    let count: i64 = restored
        .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn test_verification_of_on_disk_archive() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("smarticky.db"), b"SQLite format 3").unwrap();
    populate(source.path());

    let (data, stats) =
        create_archive_bytes(&LocalFileStore::new(source.path()), &CancellationToken::new()).unwrap();
    let result = verify_archive(&data, chrono::Utc::now(), &CancellationToken::new()).unwrap();

    assert!(result.valid);
    assert_eq!(result.total_size, stats.bytes);
    let db = &result.file_checks[0];
    assert_eq!(db.path, "/smarticky.db");
    assert_eq!(db.size, 15);
    assert!(result.file_checks[1].is_dir);
}

#[test]
fn test_truncated_archive_fails_verification() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("smarticky.db"), vec![1u8; 4096]).unwrap();
    populate(source.path());

    let (data, _) =
        create_archive_bytes(&LocalFileStore::new(source.path()), &CancellationToken::new()).unwrap();
    let truncated = &data[..20];

    let result = verify_archive(truncated, chrono::Utc::now(), &CancellationToken::new()).unwrap();
    assert!(!result.valid);
    assert!(result.error.is_some());
}
