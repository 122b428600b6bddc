use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let mut cmd = Command::new(cargo_bin!("dunning"));
    cmd.args(["--db-path", "some_db", "overdue"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[]"))
        .stderr(predicate::str::contains(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage.",
        ));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("dunning"));
    cmd.arg("--db-path").arg(&db_path).arg("overdue");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARN").not());
}
