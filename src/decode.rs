//! Response body decoding.
//!
//! Decides how a body should be decoded from the `Content-Type` header when
//! the caller did not ask for a specific [`ResponseKind`], and performs the
//! decode itself. JSON parsing is lenient: a body that fails to parse is
//! kept verbatim as a JSON string rather than failing the call.

use crate::error::BoxError;
use crate::options::ParseResponse;
use crate::response::{ResponseData, ResponseKind};
use crate::transport::ByteStream;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

/// Statuses that never carry a payload.
const NO_BODY_STATUSES: [u16; 4] = [101, 204, 205, 304];

/// Non-`text/*` media types that still decode as text.
const TEXT_TYPES: [&str; 4] = [
    "image/svg",
    "application/xml",
    "application/xhtml",
    "application/html",
];

/// Picks a [`ResponseKind`] from a `Content-Type` header value.
///
/// A missing or empty header means JSON: most APIs this crate targets speak
/// JSON and not all of them label their responses. Media-type parameters
/// such as `; charset=utf-8` are ignored.
pub fn detect_response_type(content_type: Option<&str>) -> ResponseKind {
    let Some(raw) = content_type else {
        return ResponseKind::Json;
    };
    let essence = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() || is_json_media_type(&essence) {
        return ResponseKind::Json;
    }
    if TEXT_TYPES.contains(&essence.as_str()) || essence.starts_with("text/") {
        return ResponseKind::Text;
    }
    ResponseKind::Bytes
}

/// Matches `application/json` and structured suffixes such as
/// `application/hal+json` or `application/vnd.api+json`.
fn is_json_media_type(essence: &str) -> bool {
    match essence.strip_prefix("application/") {
        Some(rest) => rest == "json" || rest.ends_with("+json"),
        None => false,
    }
}

/// Parses text as JSON, keeping unparseable bodies verbatim as a JSON
/// string.
pub(crate) fn lenient_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Whether a response can carry a decodable payload at all.
///
/// HEAD responses and the bodiless statuses (101, 204, 205, 304) do not,
/// and their body channel must be left untouched.
pub(crate) fn has_decodable_body(method: &Method, status: StatusCode) -> bool {
    *method != Method::HEAD && !NO_BODY_STATUSES.contains(&status.as_u16())
}

/// Picks the decode strategy for a response: a custom parser always
/// receives text and fills the JSON slot, an explicit kind wins next, and
/// the `Content-Type` header decides otherwise.
pub(crate) fn choose_kind(
    response_type: Option<ResponseKind>,
    parser: Option<&ParseResponse>,
    headers: &HeaderMap,
) -> ResponseKind {
    if parser.is_some() {
        return ResponseKind::Json;
    }
    response_type.unwrap_or_else(|| {
        detect_response_type(
            headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        )
    })
}

/// Why a body failed to decode. Read failures are transport-shaped and
/// eligible for retry; parse failures from a custom parser are not.
#[derive(Debug)]
pub(crate) enum DecodeFailure {
    Read(BoxError),
    Parse(BoxError),
}

/// Decodes a body stream according to `kind`.
///
/// `ResponseKind::Stream` hands the channel back without reading from it.
pub(crate) async fn decode_body(
    kind: ResponseKind,
    parser: Option<&ParseResponse>,
    stream: ByteStream,
) -> Result<ResponseData, DecodeFailure> {
    match kind {
        ResponseKind::Stream => Ok(ResponseData::Stream(stream)),
        ResponseKind::Bytes => Ok(ResponseData::Bytes(collect_bytes(stream).await?)),
        ResponseKind::Text => Ok(ResponseData::Text(collect_text(stream).await?)),
        ResponseKind::Json => {
            let text = collect_text(stream).await?;
            let value = match parser {
                Some(parse) => parse(&text).map_err(DecodeFailure::Parse)?,
                None => lenient_json(&text),
            };
            Ok(ResponseData::Json(value))
        }
    }
}

async fn collect_bytes(mut stream: ByteStream) -> Result<Bytes, DecodeFailure> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DecodeFailure::Read)?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

async fn collect_text(stream: ByteStream) -> Result<String, DecodeFailure> {
    let bytes = collect_bytes(stream).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;
    use std::sync::Arc;

    fn byte_stream(chunks: Vec<Result<Bytes, BoxError>>) -> ByteStream {
        Box::pin(stream::iter(chunks))
    }

    #[test]
    fn missing_and_empty_content_types_mean_json() {
        assert_eq!(detect_response_type(None), ResponseKind::Json);
        assert_eq!(detect_response_type(Some("")), ResponseKind::Json);
    }

    #[test]
    fn json_media_types_are_detected() {
        assert_eq!(
            detect_response_type(Some("application/json")),
            ResponseKind::Json
        );
        assert_eq!(
            detect_response_type(Some("Application/JSON; charset=utf-8")),
            ResponseKind::Json
        );
        assert_eq!(
            detect_response_type(Some("application/vnd.api+json")),
            ResponseKind::Json
        );
        assert_eq!(
            detect_response_type(Some("application/hal+json")),
            ResponseKind::Json
        );
    }

    #[test]
    fn text_media_types_are_detected() {
        assert_eq!(
            detect_response_type(Some("text/plain; charset=utf-8")),
            ResponseKind::Text
        );
        assert_eq!(detect_response_type(Some("text/html")), ResponseKind::Text);
        assert_eq!(
            detect_response_type(Some("application/xml")),
            ResponseKind::Text
        );
        assert_eq!(detect_response_type(Some("image/svg")), ResponseKind::Text);
    }

    #[test]
    fn everything_else_is_binary() {
        assert_eq!(
            detect_response_type(Some("application/octet-stream")),
            ResponseKind::Bytes
        );
        assert_eq!(detect_response_type(Some("image/png")), ResponseKind::Bytes);
        assert_eq!(
            detect_response_type(Some("video/mp4")),
            ResponseKind::Bytes
        );
    }

    #[test]
    fn lenient_json_keeps_unparseable_bodies_as_strings() {
        assert_eq!(lenient_json(r#"{"a":1}"#), json!({ "a": 1 }));
        assert_eq!(lenient_json("not json"), json!("not json"));
        assert_eq!(lenient_json(""), json!(""));
    }

    #[test]
    fn bodiless_statuses_and_head_have_no_decodable_body() {
        assert!(!has_decodable_body(&Method::GET, StatusCode::NO_CONTENT));
        assert!(!has_decodable_body(
            &Method::GET,
            StatusCode::NOT_MODIFIED
        ));
        assert!(!has_decodable_body(&Method::HEAD, StatusCode::OK));
        assert!(has_decodable_body(&Method::GET, StatusCode::OK));
        assert!(has_decodable_body(&Method::GET, StatusCode::NOT_FOUND));
    }

    #[test]
    fn custom_parser_forces_the_json_slot() {
        let parser: ParseResponse = Arc::new(|text| Ok(Value::String(text.to_string())));
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/octet-stream"),
        );
        assert_eq!(
            choose_kind(None, Some(&parser), &headers),
            ResponseKind::Json
        );
        assert_eq!(choose_kind(None, None, &headers), ResponseKind::Bytes);
        assert_eq!(
            choose_kind(Some(ResponseKind::Text), None, &headers),
            ResponseKind::Text
        );
    }

    #[tokio::test]
    async fn decodes_json_across_chunks() {
        let stream = byte_stream(vec![
            Ok(Bytes::from_static(b"{\"a\"")),
            Ok(Bytes::from_static(b":1}")),
        ]);
        let data = decode_body(ResponseKind::Json, None, stream).await.unwrap();
        assert_eq!(data.as_json(), Some(&json!({ "a": 1 })));
    }

    #[tokio::test]
    async fn invalid_json_decodes_as_a_string() {
        let stream = byte_stream(vec![Ok(Bytes::from_static(b"plain body"))]);
        let data = decode_body(ResponseKind::Json, None, stream).await.unwrap();
        assert_eq!(data.as_json(), Some(&json!("plain body")));
    }

    #[tokio::test]
    async fn decodes_text_and_bytes() {
        let stream = byte_stream(vec![Ok(Bytes::from_static(b"hello"))]);
        let data = decode_body(ResponseKind::Text, None, stream).await.unwrap();
        assert_eq!(data.as_text(), Some("hello"));

        let stream = byte_stream(vec![Ok(Bytes::from_static(b"\x00\x01"))]);
        let data = decode_body(ResponseKind::Bytes, None, stream).await.unwrap();
        assert_eq!(data.as_bytes(), Some(&Bytes::from_static(b"\x00\x01")));
    }

    #[tokio::test]
    async fn stream_kind_leaves_the_channel_unread() {
        let stream = byte_stream(vec![
            Ok(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ]);
        let data = decode_body(ResponseKind::Stream, None, stream).await.unwrap();
        let mut stream = data.into_stream().unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"ab");
    }

    #[tokio::test]
    async fn read_failures_are_reported_as_read() {
        let stream = byte_stream(vec![
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset".into()),
        ]);
        let result = decode_body(ResponseKind::Json, None, stream).await;
        assert!(matches!(result, Err(DecodeFailure::Read(_))));
    }

    #[tokio::test]
    async fn custom_parser_failures_are_reported_as_parse() {
        let parser: ParseResponse = Arc::new(|_| Err("bad payload".into()));
        let stream = byte_stream(vec![Ok(Bytes::from_static(b"anything"))]);
        let result = decode_body(ResponseKind::Json, Some(&parser), stream).await;
        assert!(matches!(result, Err(DecodeFailure::Parse(_))));
    }

    #[tokio::test]
    async fn custom_parser_receives_the_body_text() {
        let parser: ParseResponse =
            Arc::new(|text| Ok(json!({ "wrapped": text })));
        let stream = byte_stream(vec![Ok(Bytes::from_static(b"raw"))]);
        let data = decode_body(ResponseKind::Json, Some(&parser), stream)
            .await
            .unwrap();
        assert_eq!(data.as_json(), Some(&json!({ "wrapped": "raw" })));
    }
}
