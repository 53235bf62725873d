//! Stress tests for concurrency and durability.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use lsm_manifest::util::filename::manifest_file_path;
use lsm_manifest::{
    InternalKey, ManifestReader, Options, SyncMode, ValueType, VersionEdit, VersionSet,
};
use tempfile::TempDir;

fn key(user_key: &str, seq: u64) -> InternalKey {
    InternalKey::new(user_key, seq, ValueType::Value)
}

fn options() -> Arc<Options> {
    Arc::new(Options {
        sync_mode: SyncMode::None,
        ..Options::default()
    })
}

/// File numbers handed out concurrently are unique.
#[test]
fn stress_concurrent_file_numbers() {
    let dir = TempDir::new().unwrap();
    let versions = Arc::new(VersionSet::open(dir.path(), options()).unwrap());

    let num_threads = 8;
    let per_thread = 1000;

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let versions = Arc::clone(&versions);
            thread::spawn(move || {
                (0..per_thread)
                    .map(|_| versions.new_file_number())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for h in handles {
        for number in h.join().unwrap() {
            assert!(seen.insert(number), "number {} handed out twice", number);
        }
    }
    assert_eq!(seen.len(), num_threads * per_thread);
}

/// Concurrent appliers are serialized and every edit survives reopen.
#[test]
fn stress_concurrent_log_and_apply() {
    let dir = TempDir::new().unwrap();
    let num_threads = 4;
    let edits_per_thread = 50;

    {
        let versions = Arc::new(VersionSet::open(dir.path(), options()).unwrap());

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let versions = Arc::clone(&versions);
                thread::spawn(move || {
                    for i in 0..edits_per_thread {
                        let user_key = format!("t{}_{:04}", t, i);
                        let mut edit = VersionEdit::new();
                        edit.add_file(
                            0,
                            versions.new_file_number(),
                            4096,
                            key(&user_key, 2),
                            key(&user_key, 1),
                        );
                        versions.log_and_apply(&mut edit).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(versions.current().num_files(0), num_threads * edits_per_thread);
    }

    let versions = VersionSet::open(dir.path(), options()).unwrap();
    assert_eq!(versions.current().num_files(0), num_threads * edits_per_thread);
}

/// Readers holding old Versions keep seeing a consistent file set while a
/// writer keeps installing new ones.
#[test]
fn stress_readers_hold_versions() {
    let dir = TempDir::new().unwrap();
    let versions = Arc::new(VersionSet::open(dir.path(), options()).unwrap());

    let writer = {
        let versions = Arc::clone(&versions);
        thread::spawn(move || {
            let mut previous = None;
            for i in 0..200u64 {
                let number = versions.new_file_number();
                let user_key = format!("k{:05}", i);
                let mut edit = VersionEdit::new();
                edit.add_file(1, number, 100, key(&user_key, 2), key(&user_key, 1));
                if let Some(old) = previous.replace(number) {
                    edit.delete_file(1, old);
                }
                versions.log_and_apply(&mut edit).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let versions = Arc::clone(&versions);
            thread::spawn(move || {
                for _ in 0..500 {
                    let version = versions.current();
                    let count = version.num_files(1);
                    assert!(count <= 1);
                    for file in version.files(1) {
                        assert!(file.refs() >= 1);
                        assert!(versions.live_files().contains(&file.number()));
                    }
                    assert_eq!(version.num_files(1), count);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    assert_eq!(versions.current().num_files(1), 1);
    assert_eq!(versions.live_files().len(), 1);
}

/// Large snapshots spill across many manifest blocks and replay intact.
#[test]
fn stress_large_manifest() {
    let dir = TempDir::new().unwrap();
    let num_files = 3000u64;

    {
        let versions = VersionSet::open(dir.path(), options()).unwrap();
        let mut edit = VersionEdit::new();
        for i in 0..num_files {
            let user_key = format!("{:0>64}", i);
            edit.add_file(
                3,
                versions.new_file_number(),
                i * 1000,
                key(&user_key, 9),
                key(&user_key, 1),
            );
        }
        versions.log_and_apply(&mut edit).unwrap();
        assert!(edit.encode().len() > 4 * 32 * 1024);
    }

    // Reopen, then force a snapshot of every file into a fresh manifest.
    {
        let versions = VersionSet::open(dir.path(), options()).unwrap();
        versions.create_new_manifest().unwrap();
    }

    let versions = VersionSet::open(dir.path(), options()).unwrap();
    assert_eq!(versions.current().num_files(3), num_files as usize);

    let path = manifest_file_path(dir.path(), versions.manifest_number());
    let mut reader = ManifestReader::open(&path, true).unwrap();
    let edits = reader.read_all_edits().unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].new_files().len(), num_files as usize);
}
