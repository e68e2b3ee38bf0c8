//! The random read measurement loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use readprobe_store::{SharedStore, StoreResult};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

use crate::key_space::{EmptyKeySpace, ObjectKey};
use crate::provider::{FileProvider, KeySpaceProvider, ListingProvider, ProviderError};
use crate::result::OperationResult;
use crate::stats::StatsAccumulator;
use crate::telemetry::{Telemetry, TracingTelemetry};

/// Size of the buffer object bodies are drained into.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Progress is reported every this many iterations.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Errors that abort a run before any result is produced.
#[derive(Debug, Error)]
pub enum RunError {
    /// The key space could not be loaded.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A key was drawn from an empty key space.
    #[error(transparent)]
    EmptyKeySpace(#[from] EmptyKeySpace),
}

/// Byte counts of a completed transfer.
#[derive(Clone, Copy, Debug)]
struct Transfer {
    declared: u64,
    read: u64,
}

/// Reads uniformly random objects from a bucket and records the latency of every read.
///
/// Keys come from listing the bucket (optionally below a prefix), or from a local key file if
/// one is configured. Each iteration times one full read: opening the object, fetching its
/// declared size, and draining the body. The size lookup is a separate round trip for most
/// stores and therefore part of every sample.
///
/// Reads run strictly one after another. A read that fails is reported and skipped without a
/// sample; a read whose size differs from the declared size is reported but still counted.
#[derive(Debug)]
pub struct ReadOperation {
    store: SharedStore,
    bucket: String,
    prefix: Option<String>,
    iterations: u64,
    key_file: Option<PathBuf>,
    seed: Option<u64>,
    buffer_size: usize,
    telemetry: Arc<dyn Telemetry>,
}

impl ReadOperation {
    /// Creates a run of `iterations` reads against `bucket`.
    ///
    /// If `key_file` is given, keys are read from it and `prefix` is ignored. Otherwise all keys
    /// below `prefix` are listed from the store.
    pub fn new(
        store: SharedStore,
        bucket: impl Into<String>,
        prefix: Option<String>,
        iterations: u64,
        key_file: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix,
            iterations,
            key_file,
            seed: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            telemetry: Arc::new(TracingTelemetry),
        }
    }

    /// Seeds key selection, making the sequence of keys reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the size of the buffer bodies are drained into.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Replaces the sink for warnings and progress.
    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    fn provider(&self) -> Box<dyn KeySpaceProvider> {
        match &self.key_file {
            Some(path) => Box::new(FileProvider::new(path)),
            None => Box::new(ListingProvider::new(
                Arc::clone(&self.store),
                self.bucket.clone(),
                self.prefix.clone(),
            )),
        }
    }

    /// Executes the run.
    pub async fn run(&self) -> Result<OperationResult, RunError> {
        tracing::info!(
            iterations = self.iterations,
            bucket = %self.bucket,
            store = self.store.name(),
            "Random read"
        );

        let key_space = self.provider().get().await?;
        let seed = self.seed.unwrap_or_else(rand::random);
        tracing::debug!(keys = key_space.len(), seed, "Loaded key space");

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut buffer = vec![0; self.buffer_size];
        let mut stats = StatsAccumulator::new();

        for i in 0..self.iterations {
            let key = key_space.random_key(&mut rng)?;

            let start = Instant::now();
            let result = self.read_object(key, &mut buffer).await;
            let elapsed = start.elapsed();

            match result {
                Ok(transfer) => {
                    stats.record(elapsed);
                    if transfer.read != transfer.declared {
                        self.telemetry
                            .integrity_mismatch(key, transfer.declared, transfer.read);
                    }
                }
                Err(error) => self.telemetry.read_failed(key, &error),
            }

            if i > 0 && i % PROGRESS_INTERVAL == 0 {
                self.telemetry.progress(i, self.iterations);
            }
        }

        tracing::debug!(
            recorded = stats.count(),
            iterations = self.iterations,
            "Random read finished"
        );

        Ok(OperationResult::new(stats))
    }

    /// Reads one object to the end, discarding its contents.
    ///
    /// The object stream is owned by this function and released on every return path.
    async fn read_object(&self, key: &ObjectKey, buffer: &mut [u8]) -> StoreResult<Transfer> {
        let stream = self.store.get_object(&self.bucket, key.as_str()).await?;
        let metadata = self
            .store
            .get_object_metadata(&self.bucket, key.as_str())
            .await?;

        let mut reader = StreamReader::new(stream);
        let mut read = 0;
        loop {
            let len = reader.read(buffer).await?;
            if len == 0 {
                break;
            }
            read += len as u64;
        }

        Ok(Transfer {
            declared: metadata.content_length,
            read,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use readprobe_store::StoreError;
    use readprobe_test::store::{Fault, MemoryStore};

    use super::*;

    #[derive(Debug, Default)]
    struct Recorded {
        mismatches: Vec<(String, u64, u64)>,
        failures: Vec<String>,
        progress: Vec<(u64, u64)>,
    }

    #[derive(Debug, Default)]
    struct RecordingTelemetry(Mutex<Recorded>);

    impl Telemetry for RecordingTelemetry {
        fn integrity_mismatch(&self, key: &ObjectKey, declared: u64, actual: u64) {
            let mut recorded = self.0.lock().unwrap();
            recorded.mismatches.push((key.to_string(), declared, actual));
        }

        fn read_failed(&self, key: &ObjectKey, _error: &StoreError) {
            self.0.lock().unwrap().failures.push(key.to_string());
        }

        fn progress(&self, current: u64, total: u64) {
            self.0.lock().unwrap().progress.push((current, total));
        }
    }

    fn store_with(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for key in keys {
            store.insert("bucket", key, vec![1u8; 2500]);
        }
        store
    }

    fn random_read(
        store: &MemoryStore,
        iterations: u64,
    ) -> (ReadOperation, Arc<RecordingTelemetry>) {
        let telemetry = Arc::new(RecordingTelemetry::default());
        let store = Arc::new(store.clone());
        let operation = ReadOperation::new(store, "bucket", None, iterations, None)
            .seed(1)
            .telemetry(telemetry.clone());
        (operation, telemetry)
    }

    #[tokio::test]
    async fn records_every_successful_read() {
        readprobe_test::tracing::init();
        let store = store_with(&["a", "b", "c"]);
        let (operation, telemetry) = random_read(&store, 50);

        let result = operation.run().await.unwrap();

        assert_eq!(result.stats().count(), 50);
        assert_eq!(store.fetched_keys().len(), 50);
        let recorded = telemetry.0.lock().unwrap();
        assert!(recorded.failures.is_empty());
        assert!(recorded.mismatches.is_empty());
    }

    #[tokio::test]
    async fn small_buffers_still_drain_everything() {
        let store = store_with(&["a"]);
        let (operation, telemetry) = random_read(&store, 5);

        let result = operation.buffer_size(7).run().await.unwrap();

        assert_eq!(result.stats().count(), 5);
        assert!(telemetry.0.lock().unwrap().mismatches.is_empty());
    }

    #[tokio::test]
    async fn skips_failed_reads() {
        let store = store_with(&["good", "fetch", "metadata", "stream"]);
        store.fail("bucket", "fetch", Fault::Fetch);
        store.fail("bucket", "metadata", Fault::Metadata);
        store.fail("bucket", "stream", Fault::MidStream);
        let (operation, telemetry) = random_read(&store, 200);

        let result = operation.run().await.unwrap();

        let fetched = store.fetched_keys();
        let failures = fetched.iter().filter(|key| *key != "good").count();
        assert!(failures > 0);
        assert_eq!(result.stats().count(), 200 - failures);
        assert_eq!(telemetry.0.lock().unwrap().failures.len(), failures);
    }

    #[tokio::test]
    async fn records_mismatched_reads() {
        let store = store_with(&["short"]);
        store.declare_length("bucket", "short", 4000);
        let (operation, telemetry) = random_read(&store, 3);

        let result = operation.run().await.unwrap();

        assert_eq!(result.stats().count(), 3);
        let recorded = telemetry.0.lock().unwrap();
        assert_eq!(recorded.mismatches, vec![("short".to_owned(), 4000, 2500); 3]);
    }

    #[tokio::test]
    async fn reports_progress_every_thousand_iterations() {
        let store = store_with(&["a"]);
        let (operation, telemetry) = random_read(&store, 3001);

        operation.run().await.unwrap();

        let recorded = telemetry.0.lock().unwrap();
        assert_eq!(recorded.progress, [(1000, 3001), (2000, 3001), (3000, 3001)]);
    }

    #[tokio::test]
    async fn empty_listing_fails_before_reading() {
        let store = MemoryStore::new();
        let (operation, _telemetry) = random_read(&store, 10);

        let err = operation.run().await.unwrap_err();

        assert!(matches!(err, RunError::Provider(ProviderError::Empty { .. })));
        assert!(store.fetched_keys().is_empty());
    }

    #[tokio::test]
    async fn key_file_takes_precedence_over_listing() {
        let store = store_with(&["listed", "from-file"]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let operation = ReadOperation::new(
            Arc::new(store.clone()),
            "bucket",
            Some("listed".into()),
            10,
            Some(file.path().into()),
        );
        let result = operation.run().await.unwrap();

        assert_eq!(result.stats().count(), 10);
        assert_eq!(store.list_calls(), 0);
        assert!(store.fetched_keys().iter().all(|key| key == "from-file"));
    }
}
