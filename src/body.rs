//! Request bodies and their preparation for the wire.

use crate::error::{BoxError, Error, FetchFailure, Result};
use crate::options::ResolvedOptions;
use crate::transport::{ByteStream, TransportBody};
use bytes::Bytes;
use futures_util::Stream;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A request body.
///
/// `Json` and `Text` bodies get `content-type: application/json` and
/// `accept: application/json` defaulted onto the request during
/// preparation, unless the caller already set those headers. `Bytes`,
/// `Form`, and `Stream` bodies pass through untouched.
#[derive(Clone)]
pub enum Body {
    /// A JSON value, serialized to text during preparation.
    Json(serde_json::Value),
    /// Plain text, sent as-is.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// URL-encoded form pairs; the transport sets the form content type.
    Form(Vec<(String, String)>),
    /// A byte stream. The first attempt that sends it consumes it; a retry
    /// that needs the body again fails as a transport error.
    Stream(StreamBody),
}

impl Body {
    /// Builds a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Body::Json(
            serde_json::to_value(value).map_err(Error::Serialize)?,
        ))
    }

    /// Wraps a byte stream as a take-once body.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, BoxError>> + Send + 'static,
    {
        Body::Stream(StreamBody::new(Box::pin(stream)))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Form(pairs) => f.debug_tuple("Form").field(pairs).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

/// Shared take-once handle around a byte stream, so options holding one
/// stay cloneable.
#[derive(Clone)]
pub struct StreamBody {
    inner: Arc<Mutex<Option<ByteStream>>>,
}

impl StreamBody {
    fn new(stream: ByteStream) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(stream))),
        }
    }

    pub(crate) fn take(&self) -> Option<ByteStream> {
        self.inner.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Whether this method conventionally carries a request payload.
pub(crate) fn is_payload_method(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::DELETE
}

/// Prepares the body for sending: on payload methods, JSON values are
/// serialized to text and text-ish bodies get the default JSON headers.
/// Idempotent, so a retried attempt passes through unchanged.
pub(crate) fn prepare(options: &mut ResolvedOptions) -> Result<()> {
    if !is_payload_method(&options.method) {
        return Ok(());
    }
    match options.body.take() {
        None => {}
        Some(Body::Json(value)) => {
            let text = serde_json::to_string(&value).map_err(Error::Serialize)?;
            options.body = Some(Body::Text(text));
            default_json_headers(&mut options.headers);
        }
        Some(body @ Body::Text(_)) => {
            options.body = Some(body);
            default_json_headers(&mut options.headers);
        }
        Some(body) => options.body = Some(body),
    }
    Ok(())
}

fn default_json_headers(headers: &mut HeaderMap) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    }
}

/// Materializes the body for one attempt. Cheap clones for everything but
/// `Stream`, which is taken out of its handle.
pub(crate) fn materialize(
    body: &Option<Body>,
) -> std::result::Result<Option<TransportBody>, FetchFailure> {
    let Some(body) = body else {
        return Ok(None);
    };
    let materialized = match body {
        Body::Json(value) => TransportBody::Text(
            serde_json::to_string(value).map_err(|e| FetchFailure::Transport(Box::new(e)))?,
        ),
        Body::Text(text) => TransportBody::Text(text.clone()),
        Body::Bytes(bytes) => TransportBody::Bytes(bytes.clone()),
        Body::Form(pairs) => TransportBody::Form(pairs.clone()),
        Body::Stream(stream) => match stream.take() {
            Some(stream) => TransportBody::Stream(stream),
            None => {
                return Err(FetchFailure::Transport(
                    "stream body already consumed".into(),
                ))
            }
        },
    };
    Ok(Some(materialized))
}
