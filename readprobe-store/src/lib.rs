//! Object store clients used by the read benchmark.
//!
//! The benchmark only needs a small capability set from a store: stream an object's contents,
//! look up its declared size, and enumerate keys under a prefix. This crate defines that set as
//! the [`ObjectStore`] trait and ships two implementations:
//!
//! - [`LocalFs`]: a directory on the local filesystem, where every subdirectory is a bucket.
//! - [`S3Compatible`]: a plain HTTP client for S3-compatible services.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::fmt::Debug;
use std::sync::Arc;

use futures_util::stream::BoxStream;

mod error;
mod local_fs;
mod s3_compatible;

pub use error::{StoreError, StoreResult};
pub use local_fs::LocalFs;
pub use s3_compatible::S3Compatible;

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("readprobe/", env!("CARGO_PKG_VERSION"));

/// Type alias for object content streams.
pub type PayloadStream = BoxStream<'static, std::io::Result<bytes::Bytes>>;

/// A shared, type-erased [`ObjectStore`] handle.
pub type SharedStore = Arc<dyn ObjectStore>;

/// Metadata of a stored object, as declared by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// The size of the object in bytes.
    pub content_length: u64,
}

/// One page of a key listing.
#[derive(Debug, Default)]
pub struct ListPage {
    /// Keys contained in this page.
    pub keys: Vec<String>,
    /// Token to request the next page, or `None` if the listing is exhausted.
    pub continuation: Option<String>,
}

/// The operations the read benchmark requires from an object store.
#[async_trait::async_trait]
pub trait ObjectStore: Debug + Send + Sync + 'static {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Opens a stream over the contents of the object at `key`.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<PayloadStream>;

    /// Retrieves the declared metadata of the object at `key`.
    async fn get_object_metadata(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata>;

    /// Lists one page of keys starting with `prefix`.
    ///
    /// Pass the `continuation` of the previous page to fetch the next one.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage>;
}
