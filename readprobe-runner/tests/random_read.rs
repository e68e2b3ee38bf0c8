use std::io::Write;
use std::sync::Arc;

use readprobe_runner::ReadOperation;
use readprobe_store::LocalFs;
use readprobe_test::store::MemoryStore;

const KEYS: [&str; 5] = ["one", "two", "three", "four", "five"];

fn memory_store() -> MemoryStore {
    let store = MemoryStore::new();
    for key in KEYS {
        store.insert("bucket", key, key.repeat(100));
    }
    store
}

#[tokio::test]
async fn seeded_runs_read_the_same_keys() {
    readprobe_test::tracing::init();

    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    for key in KEYS {
        writeln!(key_file, "{key}").unwrap();
    }

    let mut sequences = Vec::new();
    for _ in 0..2 {
        let store = memory_store();
        let operation = ReadOperation::new(
            Arc::new(store.clone()),
            "bucket",
            None,
            100,
            Some(key_file.path().into()),
        )
        .seed(7);

        let result = operation.run().await.unwrap();
        assert_eq!(result.stats().count(), 100);
        sequences.push(store.fetched_keys());
    }

    assert_eq!(sequences[0].len(), 100);
    assert_eq!(sequences[0], sequences[1]);
}

#[tokio::test]
async fn reads_listed_files_from_disk() {
    let tempdir = tempfile::tempdir().unwrap();
    let objects = tempdir.path().join("bucket").join("objects");
    std::fs::create_dir_all(&objects).unwrap();
    for (i, key) in KEYS.iter().enumerate() {
        std::fs::write(objects.join(key), vec![b'x'; 1024 * (i + 1)]).unwrap();
    }
    std::fs::write(tempdir.path().join("bucket").join("ignored"), b"ignored").unwrap();

    let store = Arc::new(LocalFs::new(tempdir.path()));
    let operation = ReadOperation::new(store, "bucket", Some("objects/".into()), 20, None);

    let result = operation.run().await.unwrap();
    let stats = result.into_stats();

    assert_eq!(stats.count(), 20);
    assert!(stats.min() <= stats.percentile(0.5));
    assert!(stats.percentile(0.5) <= stats.max());
}

#[tokio::test]
async fn missing_bucket_aborts_the_run() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalFs::new(tempdir.path()));

    let operation = ReadOperation::new(store, "missing", None, 10, None);

    assert!(operation.run().await.is_err());
}
