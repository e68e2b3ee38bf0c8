use thiserror::Error;

/// Errors returned by [`ObjectStore`](crate::ObjectStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO errors related to payload streaming or file operations.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested object does not exist.
    #[error("object not found: {bucket}/{key}")]
    NotFound {
        /// The bucket that was queried.
        bucket: String,
        /// The key that was not found.
        key: String,
    },

    /// The key cannot be mapped onto the store's namespace.
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    /// The configured endpoint is not a usable base URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Network errors from the reqwest client, or errors building a request.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// What was being attempted.
        context: String,
        /// The underlying client error.
        #[source]
        cause: reqwest::Error,
    },

    /// The store answered with an unexpected status or an incomplete response.
    #[error("unexpected response: {0}")]
    Response(String),

    /// A listing response could not be parsed.
    #[error("failed to parse listing: {0}")]
    Listing(#[from] quick_xml::DeError),
}

impl StoreError {
    pub(crate) fn reqwest(context: impl Into<String>, cause: reqwest::Error) -> Self {
        Self::Reqwest {
            context: context.into(),
            cause,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;
