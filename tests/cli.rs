use assert_cmd::Command;
use predicates::str::{contains, is_empty};
use tempfile::TempDir;

fn ttlkv(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ttlkv").unwrap();
    cmd.arg("--db-path")
        .arg(dir.path().join("db.txt"))
        .arg("--meta-path")
        .arg(dir.path().join("db-meta.txt"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn create_then_read() {
    let dir = tempfile::tempdir().unwrap();

    ttlkv(&dir)
        .args(["create", "key1", "value1", "--ttl", "60"])
        .assert()
        .success()
        .stdout(contains("SUCCESS"));

    ttlkv(&dir)
        .args(["read", "key1"])
        .assert()
        .success()
        .stdout("value1\n");
}

#[test]
fn read_missing_key_fails() {
    let dir = tempfile::tempdir().unwrap();

    ttlkv(&dir)
        .args(["read", "missing"])
        .assert()
        .failure()
        .stdout(is_empty())
        .stderr(contains("FAILED: Key does not exist"));
}

#[test]
fn create_twice_fails() {
    let dir = tempfile::tempdir().unwrap();

    ttlkv(&dir).args(["create", "k", "v"]).assert().success();
    ttlkv(&dir)
        .args(["create", "k", "other"])
        .assert()
        .failure()
        .stderr(contains("Key already exists"));
}

#[test]
fn key_with_delimiter_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    ttlkv(&dir)
        .args(["create", "a:b", "v"])
        .assert()
        .failure()
        .stderr(contains("key cannot contain ':'"));
}

#[test]
fn delete_then_read() {
    let dir = tempfile::tempdir().unwrap();

    ttlkv(&dir).args(["create", "k", "v", "--ttl", "-1"]).assert().success();
    ttlkv(&dir)
        .args(["delete", "k"])
        .assert()
        .success()
        .stdout(contains("deleted successfully"));
    ttlkv(&dir).args(["read", "k"]).assert().failure();
    ttlkv(&dir).args(["delete", "k"]).assert().failure();
}

#[test]
fn interactive_session() {
    let dir = tempfile::tempdir().unwrap();

    ttlkv(&dir)
        .write_stdin("1\ncity\nLisbon\n0\n2\ncity\n2\nvillage\n5\n3\ncity\n4\n")
        .assert()
        .success()
        .stdout(contains("Key : city, Value : Lisbon"))
        .stdout(contains("deleted successfully"))
        .stderr(contains("FAILED: Key does not exist"))
        .stderr(contains("FAILED: Please give the correct option"));

    ttlkv(&dir).args(["read", "city"]).assert().failure();
}

#[test]
fn paths_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("env/db.txt");
    let meta_path = dir.path().join("env/db-meta.txt");

    Command::cargo_bin("ttlkv")
        .unwrap()
        .env("TTLKV_DB_PATH", &db_path)
        .env("TTLKV_META_PATH", &meta_path)
        .args(["create", "k", "v"])
        .assert()
        .success();

    assert!(std::fs::read_to_string(db_path).unwrap().starts_with("k:"));
    assert!(std::fs::read_to_string(meta_path).unwrap().starts_with("k:"));
}

#[test]
fn zero_default_ttl_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    ttlkv(&dir)
        .args(["--default-ttl", "0", "read", "k"])
        .assert()
        .failure();
}
