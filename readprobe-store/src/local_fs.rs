use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::{ListPage, ObjectMetadata, ObjectStore, PayloadStream, StoreError, StoreResult};

/// An object store on the local filesystem.
///
/// Every subdirectory of the root path is a bucket. Keys are `/`-separated paths relative to
/// the bucket directory.
///
/// Listings walk the bucket directory once and return all matching keys in a single page,
/// unless a page size is configured with [`with_page_size`](Self::with_page_size).
#[derive(Debug)]
pub struct LocalFs {
    path: PathBuf,
    page_size: Option<usize>,
}

impl LocalFs {
    /// Creates a store rooted at the given directory.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.into(),
            page_size: None,
        }
    }

    /// Limits the number of keys returned per listing page.
    ///
    /// Every page walks the full bucket directory again.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.path.join(bucket);
        for segment in key.split('/') {
            if matches!(segment, "" | "." | "..") {
                return Err(StoreError::InvalidKey(key.to_owned()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

fn not_found(bucket: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        bucket: bucket.to_owned(),
        key: key.to_owned(),
    }
}

/// Converts a file path below `root` into a `/`-separated key.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}

#[async_trait::async_trait]
impl ObjectStore for LocalFs {
    fn name(&self) -> &'static str {
        "local-fs"
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<PayloadStream> {
        let path = self.object_path(bucket, key)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found(bucket, key)),
            Err(err) => return Err(err.into()),
        };

        Ok(ReaderStream::new(file).boxed())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object_metadata(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let path = self.object_path(bucket, key)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(not_found(bucket, key)),
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found(bucket, key)),
            Err(err) => return Err(err.into()),
        };

        Ok(ObjectMetadata {
            content_length: metadata.len(),
        })
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage> {
        let root = self.path.join(bucket);
        let mut keys = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let Some(key) = relative_key(&root, &path) else {
                    tracing::warn!(path = %path.display(), "Skipping file with non UTF-8 name");
                    continue;
                };
                if prefix.is_none_or(|prefix| key.starts_with(prefix)) {
                    keys.push(key);
                }
            }
        }

        keys.sort_unstable();
        if let Some(after) = continuation {
            keys.retain(|key| key.as_str() > after);
        }

        let continuation = match self.page_size {
            Some(page_size) if keys.len() > page_size => {
                keys.truncate(page_size);
                keys.last().cloned()
            }
            _ => None,
        };

        Ok(ListPage { keys, continuation })
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use futures_util::TryStreamExt;

    use super::*;

    fn write_object(root: &Path, bucket: &str, key: &str, contents: &[u8]) {
        let path = root.join(bucket).join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn reads_objects_and_metadata() {
        let tempdir = tempfile::tempdir().unwrap();
        write_object(tempdir.path(), "bucket", "nested/key.bin", b"oh hai!");
        let store = LocalFs::new(tempdir.path());

        let stream = store.get_object("bucket", "nested/key.bin").await.unwrap();
        let contents: BytesMut = stream.try_collect().await.unwrap();
        assert_eq!(contents.as_ref(), b"oh hai!");

        let metadata = store
            .get_object_metadata("bucket", "nested/key.bin")
            .await
            .unwrap();
        assert_eq!(metadata.content_length, 7);
    }

    #[tokio::test]
    async fn missing_objects_are_not_found() {
        let tempdir = tempfile::tempdir().unwrap();
        write_object(tempdir.path(), "bucket", "dir/key", b"x");
        let store = LocalFs::new(tempdir.path());

        let err = store.get_object("bucket", "missing").await.err().unwrap();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err = store
            .get_object_metadata("bucket", "dir")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalFs::new(tempdir.path());

        for key in ["../secret", "a//b", "./a", ""] {
            let err = store.get_object("bucket", key).await.err().unwrap();
            assert!(matches!(err, StoreError::InvalidKey(_)), "{key:?}");
        }
    }

    #[tokio::test]
    async fn lists_keys_under_prefix() {
        let tempdir = tempfile::tempdir().unwrap();
        write_object(tempdir.path(), "bucket", "logs/a", b"1");
        write_object(tempdir.path(), "bucket", "logs/2024/b", b"2");
        write_object(tempdir.path(), "bucket", "data/c", b"3");
        write_object(tempdir.path(), "other", "logs/d", b"4");
        let store = LocalFs::new(tempdir.path());

        let page = store
            .list_objects("bucket", Some("logs/"), None)
            .await
            .unwrap();
        assert_eq!(page.keys, ["logs/2024/b", "logs/a"]);
        assert_eq!(page.continuation, None);

        let page = store.list_objects("bucket", None, None).await.unwrap();
        assert_eq!(page.keys.len(), 3);
    }

    #[tokio::test]
    async fn lists_large_buckets_in_one_page() {
        let tempdir = tempfile::tempdir().unwrap();
        for i in 0..1500 {
            write_object(tempdir.path(), "bucket", &format!("objects/{i:04}"), b"x");
        }
        let store = LocalFs::new(tempdir.path());

        let page = store.list_objects("bucket", None, None).await.unwrap();
        assert_eq!(page.keys.len(), 1500);
        assert_eq!(page.keys.first().map(String::as_str), Some("objects/0000"));
        assert_eq!(page.continuation, None);
    }

    #[tokio::test]
    async fn paginates_listings() {
        let tempdir = tempfile::tempdir().unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            write_object(tempdir.path(), "bucket", key, b"x");
        }
        let store = LocalFs::new(tempdir.path()).with_page_size(2);

        let mut pages = Vec::new();
        let mut continuation = None;
        loop {
            let page = store
                .list_objects("bucket", None, continuation.as_deref())
                .await
                .unwrap();
            pages.push(page.keys);
            match page.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        assert_eq!(pages, [vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
    }

    #[tokio::test]
    async fn listing_missing_bucket_fails() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalFs::new(tempdir.path());

        let err = store.list_objects("nope", None, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
