//! Response wrapper that preserves decoded data and raw response details.
//!
//! [`FetchResponse`] carries the decoded body alongside metadata about the
//! HTTP transaction, making it easy to access timing information, headers,
//! and the status line for debugging and observability.

use crate::error::{Error, Result};
use crate::transport::{ByteStream, TransportResponse};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

/// How a response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Parse the body as JSON. Bodies that are not valid JSON are kept
    /// verbatim as a JSON string.
    Json,
    /// Collect the body as UTF-8 text.
    Text,
    /// Collect the raw body bytes.
    Bytes,
    /// Hand the body back as an unconsumed byte stream.
    Stream,
}

/// A decoded response body.
///
/// Which variant you get is controlled by [`ResponseKind`], either set
/// explicitly on the request or detected from the `Content-Type` header.
pub enum ResponseData {
    Json(Value),
    Text(String),
    Bytes(Bytes),
    Stream(ByteStream),
}

impl ResponseData {
    /// Returns the parsed JSON value, if this is a JSON body.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the collected text, if this is a text body.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the collected bytes, if this is a binary body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseData::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Consumes this value and returns the body stream, if this is a
    /// streaming body.
    pub fn into_stream(self) -> Option<ByteStream> {
        match self {
            ResponseData::Stream(stream) => Some(stream),
            _ => None,
        }
    }
}

impl fmt::Debug for ResponseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseData::Json(value) => f.debug_tuple("Json").field(value).finish(),
            ResponseData::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ResponseData::Bytes(bytes) => f
                .debug_tuple("Bytes")
                .field(&format_args!("{} bytes", bytes.len()))
                .finish(),
            ResponseData::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// An HTTP response with its decoded body and call metadata.
///
/// This type provides the decoded response data along with metadata about
/// the HTTP transaction, including latency, status code, headers, the final
/// URL, and how many attempts the call took.
///
/// # Examples
///
/// ```no_run
/// use refetch::Client;
///
/// # async fn example() -> Result<(), refetch::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.get("/users/123").await?;
///
/// println!("Status: {}", response.status);
/// println!("Request took {:?}", response.latency);
/// println!("Retry attempts: {}", response.attempts);
///
/// if let Some(data) = &response.data {
///     println!("Body: {:?}", data.as_json());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FetchResponse {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The reason phrase for the status, e.g. `"Not Found"` for 404.
    /// Empty when the status has no canonical reason.
    pub status_text: String,

    /// The response headers.
    pub headers: HeaderMap,

    /// The URL the response was served from.
    pub url: Url,

    /// The decoded response body.
    ///
    /// `None` for responses that carry no payload: statuses 101, 204, 205
    /// and 304, and any response to a HEAD request.
    pub data: Option<ResponseData>,

    /// The number of attempts made to complete this request.
    ///
    /// This will be `1` for requests that succeeded on the first try, and
    /// higher for requests that required retries.
    pub attempts: u32,

    /// The total latency of the request, including all retry attempts and
    /// the delays between them.
    pub latency: Duration,
}

impl FetchResponse {
    /// Splits a transport response into the response shell and its body
    /// stream. The body is decoded separately so that bodiless responses
    /// and streaming reads never touch the channel.
    pub(crate) fn from_transport(
        raw: TransportResponse,
        attempts: u32,
        latency: Duration,
    ) -> (Self, ByteStream) {
        let TransportResponse {
            status,
            status_text,
            headers,
            url,
            body,
        } = raw;
        (
            Self {
                status,
                status_text,
                headers,
                url,
                data: None,
                attempts,
                latency,
            },
            body,
        )
    }

    /// Returns a reference to a header value by name.
    ///
    /// Returns `None` when the header is absent or not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Deserializes the decoded body into `T`.
    ///
    /// JSON bodies deserialize directly. Text bodies deserialize as a JSON
    /// string, so `String` always works for them. An absent body
    /// deserializes as JSON `null`, so `()` and `Option<_>` work for
    /// bodiless responses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for binary and streaming bodies, and when
    /// the body does not match the shape of `T`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use refetch::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User {
    ///     id: u64,
    ///     name: String,
    /// }
    ///
    /// # async fn example() -> Result<(), refetch::Error> {
    /// let client = Client::new()?;
    /// let user: User = client
    ///     .get("https://api.example.com/users/123")
    ///     .await?
    ///     .decode()?;
    /// println!("User: {}", user.name);
    /// # Ok(())
    /// # }
    /// ```
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self.data {
            None => Value::Null,
            Some(ResponseData::Json(value)) => value,
            Some(ResponseData::Text(text)) => Value::String(text),
            Some(ResponseData::Bytes(_)) | Some(ResponseData::Stream(_)) => {
                return Err(Error::Decode(
                    "binary and streaming bodies cannot be decoded into typed values".into(),
                ))
            }
        };
        serde_json::from_value(value).map_err(|e| Error::Decode(Box::new(e)))
    }
}
