//! Network access to remote segments
//!
//! The pipeline talks to the network only through [`SegmentSource`], which
//! keeps the probe and retrieval pools testable without a server.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::{Error, Result};

/// Response of a full-body fetch
#[derive(Clone, Debug)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body; only read when the status is 200
    pub body: Bytes,
}

/// Abstraction over segment existence checks and downloads
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Metadata-only existence check (HEAD); returns the HTTP status
    ///
    /// Transport failures (timeout, refused connection) are returned as errors,
    /// any received status is `Ok`.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16>;

    /// Full-body download (GET)
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse>;
}

/// Production [`SegmentSource`] backed by a shared reqwest client
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a client that sends `user_agent` with every request
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Map a reqwest error onto the crate's transient/permanent taxonomy
///
/// Connections that are refused, reset, or closed before the response is
/// complete all become [`Error::Connection`] so the retry wrapper picks them up.
fn classify(url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect()
        || err.is_request()
        || err.is_body()
        || is_dropped_connection(&err)
    {
        Error::Connection {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        Error::Network(err)
    }
}

/// Whether an I/O error anywhere in the source chain means the peer went away
fn is_dropped_connection(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
            )
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[async_trait]
impl SegmentSource for HttpSource {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;
        Ok(response.status().as_u16())
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status().as_u16();
        if status != 200 {
            tracing::trace!(url = %url, status = status, "Non-200 response, body discarded");
            return Ok(FetchResponse {
                status,
                body: Bytes::new(),
            });
        }

        let body = response.bytes().await.map_err(|e| classify(url, e))?;
        Ok(FetchResponse { status, body })
    }
}
