use std::future::Future;

use bytes::Bytes;

use crate::core::ByteRange;

/// Size and range capability of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceInfo {
    /// `None` when the server does not report a length.
    pub total_bytes: Option<u64>,
    /// Whether the server honours `Range` requests.
    pub accepts_ranges: bool,
}

/// A response whose body has been read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResponse {
    /// HTTP status code.
    pub status: u16,
    pub body: Bytes,
}

impl RangeResponse {
    /// 2xx, which includes 206 Partial Content.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Range-capable fetch primitive.
///
/// Resource ids are opaque to the downloader; implementations decide how to
/// resolve them. Transport failures are reported as `Err`; any HTTP answer,
/// including error statuses, is an `Ok` response.
///
/// # Implementations
///
/// - [`ReqwestClient`]: resolves resource ids as URLs
/// - Mock implementations for testing
pub trait RangeClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// One lightweight request for length and `Accept-Ranges`.
    fn probe(
        &self,
        resource_id: &str,
    ) -> impl Future<Output = std::result::Result<ResourceInfo, Self::Error>> + Send;

    /// Fetch `range`, or the whole resource when `None`.
    fn fetch(
        &self,
        resource_id: &str,
        range: Option<ByteRange>,
    ) -> impl Future<Output = std::result::Result<RangeResponse, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};

    use crate::error::{FetchError, Result};

    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new() -> Result<Self> {
            let client = reqwest::Client::builder()
                .build()
                .map_err(|e| FetchError::Client(e.to_string()))?;
            Ok(Self { client })
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl RangeClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn probe(&self, resource_id: &str) -> std::result::Result<ResourceInfo, Self::Error> {
            let response = self.client.head(resource_id).send().await?;
            let headers = response.headers();
            let total_bytes = headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let accepts_ranges = headers
                .get(ACCEPT_RANGES)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));
            Ok(ResourceInfo {
                total_bytes,
                accepts_ranges,
            })
        }

        async fn fetch(
            &self,
            resource_id: &str,
            range: Option<ByteRange>,
        ) -> std::result::Result<RangeResponse, Self::Error> {
            let mut request = self.client.get(resource_id);
            if let Some(range) = range {
                request = request.header(RANGE, range.header_value());
            }
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok(RangeResponse { status, body })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
