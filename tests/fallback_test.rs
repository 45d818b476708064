use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let catalog = common::write_catalog(common::CATALOG).unwrap();
    let commands = common::write_commands(&[["create", "1", "1", "", "", ""]]).unwrap();

    let mut cmd = Command::new(cargo_bin!("enrollpay"));
    cmd.arg(commands.path())
        .arg("--catalog")
        .arg(catalog.path())
        .arg("--db-path")
        .arg("some_db");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."))
        .stdout(predicate::str::contains("1,1,1,100,0,100,,pending,,ORD-"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let catalog = common::write_catalog(common::CATALOG).unwrap();
    let commands = common::write_commands(&[["create", "1", "1", "", "", ""]]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("enrollpay"));
    cmd.arg(commands.path())
        .arg("--catalog")
        .arg(catalog.path())
        .arg("--db-path")
        .arg(&db_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING").not());
}
