use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{
    ListPage, ObjectMetadata, ObjectStore, PayloadStream, StoreError, StoreResult, USER_AGENT,
};

/// An S3-compatible object store spoken to over plain HTTP.
///
/// Objects are addressed path-style, as `{endpoint}/{bucket}/{key}`. Requests are sent
/// unsigned, optionally carrying a bearer token, which works for public buckets, local
/// emulators and gateways that handle authentication themselves.
///
/// Keys containing `.` or `..` segments are rejected, since URL normalization would resolve
/// them to a different object.
#[derive(Debug)]
pub struct S3Compatible {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<SecretString>,
}

impl S3Compatible {
    /// Creates a client for the given endpoint.
    ///
    /// The `request_timeout` applies to every request including the full body transfer.
    pub fn new(endpoint: &str, request_timeout: Option<Duration>) -> StoreResult<Self> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| StoreError::InvalidEndpoint(endpoint.to_owned()))?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|cause| StoreError::reqwest("building HTTP client", cause))?;

        Ok(Self {
            client,
            endpoint,
            token: None,
        })
    }

    /// Sends the given bearer token with every request.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    fn bucket_url(&self, bucket: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(bucket);
        }
        url
    }

    fn object_url(&self, bucket: &str, key: &str) -> StoreResult<Url> {
        if key.split('/').any(|segment| matches!(segment, "." | "..")) {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }

        let mut url = self.bucket_url(bucket);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(key.split('/'));
        }
        Ok(url)
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> StoreResult<Response> {
        let builder = match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        };
        builder
            .send()
            .await
            .map_err(|cause| StoreError::reqwest(context, cause))
    }

    async fn send_object_request(
        &self,
        builder: RequestBuilder,
        bucket: &str,
        key: &str,
    ) -> StoreResult<Response> {
        let context = format!("requesting {bucket}/{key}");
        let response = self.send(builder, &context).await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            }),
            status => Err(StoreError::Response(format!("{context}: status {status}"))),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Compatible {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<PayloadStream> {
        let request = self.client.get(self.object_url(bucket, key)?);
        let response = self.send_object_request(request, bucket, key).await?;

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(stream.boxed())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object_metadata(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let request = self.client.head(self.object_url(bucket, key)?);
        let response = self.send_object_request(request, bucket, key).await?;

        // `Response::content_length` reports the (empty) body of a HEAD response, so the header
        // has to be read directly.
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| {
                StoreError::Response(format!("missing content-length for {bucket}/{key}"))
            })?;

        Ok(ObjectMetadata { content_length })
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage> {
        let mut url = self.bucket_url(bucket);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("list-type", "2");
            if let Some(prefix) = prefix {
                query.append_pair("prefix", prefix);
            }
            if let Some(token) = continuation {
                query.append_pair("continuation-token", token);
            }
        }

        let context = format!("listing {bucket}");
        let response = self.send(self.client.get(url), &context).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Response(format!("{context}: status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|cause| StoreError::reqwest(context, cause))?;
        parse_list_page(&body)
    }
}

/// The parts of a `ListObjectsV2` response we care about.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListEntry>,
    #[serde(default)]
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEntry {
    key: String,
}

fn parse_list_page(body: &str) -> StoreResult<ListPage> {
    let result: ListBucketResult = quick_xml::de::from_str(body)?;

    let continuation = match (result.is_truncated, result.next_continuation_token) {
        (true, Some(token)) => Some(token),
        (true, None) => {
            return Err(StoreError::Response(
                "truncated listing without continuation token".to_owned(),
            ));
        }
        (false, _) => None,
    };

    Ok(ListPage {
        keys: result.contents.into_iter().map(|entry| entry.key).collect(),
        continuation,
    })
}
