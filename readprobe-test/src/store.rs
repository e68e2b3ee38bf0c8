//! In-memory object store with fault injection.
//!
//! [`MemoryStore`] implements [`ObjectStore`] on top of a `BTreeMap`. It is [`Clone`] so tests
//! can keep a handle for inspection (fetched keys, listing calls) while the code under test owns
//! another copy.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::StreamExt;
use readprobe_store::{
    ListPage, ObjectMetadata, ObjectStore, PayloadStream, StoreError, StoreResult,
};

/// Size of the chunks object contents are streamed in.
const CHUNK_SIZE: usize = 1000;

/// Where an injected failure surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Opening the object stream fails.
    Fetch,
    /// The metadata lookup fails.
    Metadata,
    /// The stream yields its first chunk and then a connection reset.
    MidStream,
}

#[derive(Debug)]
struct Entry {
    contents: Bytes,
    declared_length: Option<u64>,
    fault: Option<Fault>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<(String, String), Entry>,
    page_size: Option<usize>,
    fetched: Vec<String>,
    list_calls: usize,
}

/// An in-memory [`ObjectStore`] for tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Limits the number of keys per listing page.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = Some(page_size.max(1));
        self
    }

    /// Stores an object, replacing any previous one at the same key.
    pub fn insert(&self, bucket: &str, key: &str, contents: impl Into<Bytes>) {
        let entry = Entry {
            contents: contents.into(),
            declared_length: None,
            fault: None,
        };
        self.lock().objects.insert(object_id(bucket, key), entry);
    }

    /// Makes the metadata of an object report `length` instead of its actual size.
    pub fn declare_length(&self, bucket: &str, key: &str, length: u64) {
        let mut inner = self.lock();
        if let Some(entry) = inner.objects.get_mut(&object_id(bucket, key)) {
            entry.declared_length = Some(length);
        }
    }

    /// Injects a failure for every read of the given object.
    pub fn fail(&self, bucket: &str, key: &str, fault: Fault) {
        let mut inner = self.lock();
        if let Some(entry) = inner.objects.get_mut(&object_id(bucket, key)) {
            entry.fault = Some(fault);
        }
    }

    /// Returns all keys passed to `get_object`, in call order.
    pub fn fetched_keys(&self) -> Vec<String> {
        self.lock().fetched.clone()
    }

    /// Returns the number of `list_objects` calls.
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }
}

fn object_id(bucket: &str, key: &str) -> (String, String) {
    (bucket.to_owned(), key.to_owned())
}

fn connection_reset() -> StoreError {
    StoreError::Io(io::Error::new(
        io::ErrorKind::ConnectionReset,
        "injected failure",
    ))
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<PayloadStream> {
        let mut inner = self.lock();
        inner.fetched.push(key.to_owned());

        let Some(entry) = inner.objects.get(&object_id(bucket, key)) else {
            return Err(StoreError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        };

        let contents = entry.contents.clone();
        let mut chunks: Vec<io::Result<Bytes>> = (0..contents.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(contents.slice(start..(start + CHUNK_SIZE).min(contents.len()))))
            .collect();

        match entry.fault {
            Some(Fault::Fetch) => return Err(connection_reset()),
            Some(Fault::MidStream) => {
                chunks.truncate(1);
                chunks.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
            }
            Some(Fault::Metadata) | None => {}
        }

        Ok(futures_util::stream::iter(chunks).boxed())
    }

    async fn get_object_metadata(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let inner = self.lock();
        let Some(entry) = inner.objects.get(&object_id(bucket, key)) else {
            return Err(StoreError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        };

        if entry.fault == Some(Fault::Metadata) {
            return Err(connection_reset());
        }

        Ok(ObjectMetadata {
            content_length: entry
                .declared_length
                .unwrap_or(entry.contents.len() as u64),
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage> {
        let mut inner = self.lock();
        inner.list_calls += 1;

        let mut keys: Vec<String> = inner
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key)
            .filter(|key| prefix.is_none_or(|prefix| key.starts_with(prefix)))
            .filter(|key| continuation.is_none_or(|after| key.as_str() > after))
            .cloned()
            .collect();

        let continuation = match inner.page_size {
            Some(page_size) if keys.len() > page_size => {
                keys.truncate(page_size);
                keys.last().cloned()
            }
            _ => None,
        };

        Ok(ListPage { keys, continuation })
    }
}
