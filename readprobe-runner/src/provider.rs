//! Sources for the [`KeySpace`] of a run.
//!
//! A key space is materialized exactly once per run, before any read is timed, so that loading
//! cost never leaks into the measured latencies. Keys either come from listing a prefix in the
//! store ([`ListingProvider`]) or from a local file with one key per line ([`FileProvider`]).

use std::collections::HashSet;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use readprobe_store::{SharedStore, StoreError};
use thiserror::Error;

use crate::key_space::{KeySpace, ObjectKey};

/// Errors raised while loading a [`KeySpace`].
///
/// These are fatal for a run and always surface before the first read.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The source was readable but contained no keys.
    #[error("no object keys found in {origin}")]
    Empty {
        /// Human readable description of where keys were loaded from.
        origin: String,
    },

    /// Listing the store failed.
    #[error("failed to list objects in {origin}")]
    Listing {
        /// The bucket and prefix that were listed.
        origin: String,
        /// The store error.
        #[source]
        cause: StoreError,
    },

    /// The key file could not be read.
    #[error("failed to read key file {}", path.display())]
    KeyFile {
        /// Path of the key file.
        path: PathBuf,
        /// The error reading the file.
        #[source]
        cause: io::Error,
    },
}

/// Produces the [`KeySpace`] for a run.
#[async_trait::async_trait]
pub trait KeySpaceProvider: Debug + Send + Sync {
    /// Loads all keys, failing if there are none.
    async fn get(&self) -> Result<KeySpace, ProviderError>;
}

/// Lists all keys under a prefix of a bucket.
#[derive(Debug)]
pub struct ListingProvider {
    store: SharedStore,
    bucket: String,
    prefix: Option<String>,
}

impl ListingProvider {
    /// Creates a provider listing `bucket`, optionally restricted to `prefix`.
    pub fn new(store: SharedStore, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix,
        }
    }

    fn origin(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{prefix}", self.bucket),
            None => self.bucket.clone(),
        }
    }
}

#[async_trait::async_trait]
impl KeySpaceProvider for ListingProvider {
    async fn get(&self) -> Result<KeySpace, ProviderError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_objects(&self.bucket, self.prefix.as_deref(), continuation.as_deref())
                .await
                .map_err(|cause| ProviderError::Listing {
                    origin: self.origin(),
                    cause,
                })?;

            pages += 1;
            keys.extend(page.keys.into_iter().map(ObjectKey::from));

            match page.continuation {
                Some(token) if !seen_tokens.insert(token.clone()) => {
                    return Err(ProviderError::Listing {
                        origin: self.origin(),
                        cause: StoreError::Response(format!(
                            "continuation token {token:?} returned twice"
                        )),
                    });
                }
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            store = self.store.name(),
            keys = keys.len(),
            pages,
            "Listed object keys"
        );

        if keys.is_empty() {
            return Err(ProviderError::Empty {
                origin: self.origin(),
            });
        }

        Ok(KeySpace::new(keys))
    }
}

/// Reads keys from a local UTF-8 file, one key per line.
///
/// Trailing whitespace (including `\r`) is stripped and blank lines are skipped.
#[derive(Debug)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    /// Creates a provider reading the given file.
    pub fn new(path: &Path) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl KeySpaceProvider for FileProvider {
    async fn get(&self) -> Result<KeySpace, ProviderError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|cause| ProviderError::KeyFile {
                path: self.path.clone(),
                cause,
            })?;

        let key_space: KeySpace = contents
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(ObjectKey::from)
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            keys = key_space.len(),
            "Loaded object keys from file"
        );

        if key_space.is_empty() {
            return Err(ProviderError::Empty {
                origin: self.path.display().to_string(),
            });
        }

        Ok(key_space)
    }
}
