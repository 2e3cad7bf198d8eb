//! Multi-handle concurrency over one on-disk store. flock binds to the
//! open file description, so two handles in one process exercise the same
//! exclusion the multi-process case does.

use ontograph::{Config, EnvError, LockWait, OntoGraphEnv};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn write_ontology(dir: &Path, file: &str, id: &str) {
    let doc = format!(
        "@prefix owl: <http://www.w3.org/2002/07/owl#> .\n<{id}> a owl:Ontology .\n"
    );
    std::fs::write(dir.join(file), doc).unwrap();
}

fn config(root: &Path, read_only: bool, wait: LockWait) -> Config {
    Config::builder(root)
        .offline(true)
        .read_only(read_only)
        .lock_wait(wait)
        .build()
        .unwrap()
}

fn seeded_store(dir: &TempDir) {
    write_ontology(dir.path(), "a.ttl", "urn:example:a");
    let mut env =
        OntoGraphEnv::create(config(dir.path(), false, LockWait::NoWait), false).unwrap();
    env.add(dir.path().join("a.ttl")).unwrap();
    env.close().unwrap();
}

#[test]
fn test_second_writer_is_locked_out() {
    let dir = TempDir::new().unwrap();
    seeded_store(&dir);

    let _writer = OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait)).unwrap();
    let second = OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait));
    assert!(matches!(second, Err(EnvError::LockHeld { .. })));
}

#[test]
fn test_readers_coexist() {
    let dir = TempDir::new().unwrap();
    seeded_store(&dir);

    let first = OntoGraphEnv::open(config(dir.path(), true, LockWait::NoWait)).unwrap();
    let second = OntoGraphEnv::open(config(dir.path(), true, LockWait::NoWait)).unwrap();
    assert_eq!(first.ids().unwrap(), second.ids().unwrap());
}

#[test]
fn test_writer_excludes_reader_and_vice_versa() {
    let dir = TempDir::new().unwrap();
    seeded_store(&dir);

    {
        let _writer = OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait)).unwrap();
        let reader = OntoGraphEnv::open(config(dir.path(), true, LockWait::NoWait));
        assert!(matches!(reader, Err(EnvError::LockHeld { .. })));
    }
    {
        let _reader = OntoGraphEnv::open(config(dir.path(), true, LockWait::NoWait)).unwrap();
        let writer = OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait));
        assert!(matches!(writer, Err(EnvError::LockHeld { .. })));
    }
}

#[test]
fn test_open_times_out_under_contention() {
    let dir = TempDir::new().unwrap();
    seeded_store(&dir);

    let _writer = OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait)).unwrap();

    let started = Instant::now();
    let second = OntoGraphEnv::open(config(dir.path(), false, LockWait::TimeoutMs(100)));
    assert!(matches!(second, Err(EnvError::LockTimeout { .. })));
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_reader_blocks_until_writer_commits() {
    let dir = TempDir::new().unwrap();
    seeded_store(&dir);
    let hold = Duration::from_millis(200);

    let mut writer = OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait)).unwrap();

    let root = dir.path().to_path_buf();
    let reader = std::thread::spawn(move || {
        let started = Instant::now();
        let env = OntoGraphEnv::open(config(&root, true, LockWait::Block)).unwrap();
        (started.elapsed(), env.ids().unwrap())
    });

    // commit a second ontology while the reader is waiting on the lock
    std::thread::sleep(hold);
    write_ontology(dir.path(), "b.ttl", "urn:example:b");
    writer.add(dir.path().join("b.ttl")).unwrap();
    writer.close().unwrap();

    let (waited, ids) = reader.join().unwrap();
    assert!(waited >= hold, "reader acquired the lock before release");
    // the reader observes the fully committed state
    assert_eq!(ids, vec!["urn:example:a", "urn:example:b"]);
}

#[test]
fn test_lock_released_on_drop() {
    let dir = TempDir::new().unwrap();
    seeded_store(&dir);

    {
        let _writer = OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait)).unwrap();
    }
    OntoGraphEnv::open(config(dir.path(), false, LockWait::NoWait)).unwrap();
}
