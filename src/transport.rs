//! The transport seam: what actually moves bytes.
//!
//! Everything above this module decides what to send and how to interpret
//! what comes back; a [`Transport`] only performs the exchange. The default
//! [`HttpTransport`] wraps a shared [`reqwest::Client`]; tests and
//! instrumentation can inject their own implementation via
//! [`ClientBuilder::build_with`](crate::ClientBuilder::build_with).

use crate::error::{BoxError, Error, Result};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// A boxed byte stream: the body channel of a [`TransportResponse`].
pub type ByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, BoxError>> + Send + 'static>>;

/// A fully-assembled request, ready to send.
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<TransportBody>,
}

impl TransportRequest {
    /// Creates a bodiless request with no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Attaches a body.
    pub fn body(mut self, body: TransportBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// A materialized request body.
pub enum TransportBody {
    Text(String),
    Bytes(Bytes),
    Form(Vec<(String, String)>),
    Stream(ByteStream),
}

impl fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            TransportBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            TransportBody::Form(pairs) => f.debug_tuple("Form").field(&pairs.len()).finish(),
            TransportBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// What came back from the wire: the status line, headers, the final URL,
/// and an unconsumed body channel.
pub struct TransportResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: ByteStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

/// The capability invoked to execute one HTTP exchange.
///
/// Implementations move bytes and nothing else: no retries, no decoding, no
/// option handling. Swapping the transport leaves the rest of the pipeline
/// untouched.
pub trait Transport: Send + Sync {
    /// Executes the exchange, resolving with the response head plus an
    /// unconsumed body channel.
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = std::result::Result<TransportResponse, BoxError>> + Send;
}

/// The default [`Transport`], backed by [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport over a freshly-built [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wraps an existing [`reqwest::Client`], keeping its pool and TLS
    /// configuration.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, BoxError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = match body {
                TransportBody::Text(text) => builder.body(text),
                TransportBody::Bytes(bytes) => builder.body(bytes),
                TransportBody::Form(pairs) => builder.form(&pairs),
                TransportBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
            };
        }

        let response = builder.send().await?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body: ByteStream =
            Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(Into::into)));

        Ok(TransportResponse {
            status,
            status_text,
            headers,
            url,
            body,
        })
    }
}
