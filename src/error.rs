//! Error types for fetch calls.
//!
//! This module provides error types that preserve maximum debugging
//! information while remaining ergonomic to use. A failed call surfaces as
//! [`Error::Fetch`] carrying a [`FetchError`] with the composed message,
//! the originating request, the resolved options, the error response (with
//! its decoded body) when one exists, and the underlying cause as
//! `source()`.

use crate::abort::AbortReason;
use crate::context::FetchContext;
use crate::options::ResolvedOptions;
use crate::request::FetchRequest;
use crate::response::{FetchResponse, ResponseData};
use http::{Method, StatusCode};
use std::fmt;

/// A type-erased error, used at the transport and hook boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The lifecycle stage a failing hook was registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    OnRequest,
    OnRequestError,
    OnResponse,
    OnResponseError,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookStage::OnRequest => "on_request",
            HookStage::OnRequestError => "on_request_error",
            HookStage::OnResponse => "on_response",
            HookStage::OnResponseError => "on_response_error",
        })
    }
}

/// The main error type for fetch calls.
///
/// # Examples
///
/// ```no_run
/// use refetch::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get("/endpoint").await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::Fetch(e)) => {
///         eprintln!("Call failed: {}", e);
///         if let Some(status) = e.status() {
///             eprintln!("Status: {}", status);
///         }
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid configuration was provided, such as an invalid header name
    /// or a hook removing the response from the context.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The assembled request URL failed to parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request body could not be serialized to JSON.
    #[error("Failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The response body could not be decoded.
    ///
    /// Raised by a failing custom `parse_response` decoder and by typed
    /// deserialization; never by the lenient default JSON decode.
    #[error("Failed to decode response body: {0}")]
    Decode(#[source] BoxError),

    /// A lifecycle hook failed.
    ///
    /// Hook failures are always fatal: they bypass the retry handler
    /// regardless of which stage failed.
    #[error("{stage} hook failed: {source}")]
    Hook {
        /// The stage the failing hook was registered for.
        stage: HookStage,
        /// The error the hook returned.
        source: BoxError,
    },

    /// The call itself failed: transport failure, timeout, cancellation,
    /// or an error status after retries were exhausted.
    #[error(transparent)]
    Fetch(#[from] Box<FetchError>),
}

impl From<FetchError> for Error {
    fn from(error: FetchError) -> Self {
        Error::Fetch(Box::new(error))
    }
}

impl Error {
    /// Returns the HTTP status code if this error carries a response.
    pub fn status(&self) -> Option<StatusCode> {
        self.as_fetch().and_then(|e| e.status())
    }

    /// Returns the inner [`FetchError`] for failed calls.
    pub fn as_fetch(&self) -> Option<&FetchError> {
        match self {
            Error::Fetch(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the call failed because the per-attempt timeout
    /// fired.
    pub fn is_timeout(&self) -> bool {
        self.as_fetch()
            .map(|e| e.kind() == ErrorKind::Timeout)
            .unwrap_or(false)
    }

    /// Returns `true` if the call was cancelled through an external signal.
    pub fn is_aborted(&self) -> bool {
        self.as_fetch()
            .map(|e| e.kind() == ErrorKind::Aborted)
            .unwrap_or(false)
    }
}

/// A specialized `Result` type for fetch calls.
///
/// This is a convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// What ended a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transport failed outright: connect, DNS, I/O, or a mid-body
    /// read failure.
    Transport,
    /// The per-attempt timeout fired.
    Timeout,
    /// The caller's cancellation signal fired.
    Aborted,
    /// The response carried an error status.
    Status,
}

/// A single attempt's failure, before the retry decision.
///
/// Hooks observe this through the call context; it becomes the `source()`
/// of the final [`FetchError`] when the call is not retried.
#[derive(thiserror::Error, Debug)]
pub enum FetchFailure {
    /// The attempt was cancelled, either by the armed timeout or by the
    /// caller's signal.
    #[error("{0}")]
    Aborted(AbortReason),

    /// The transport (or the body read during decode) failed.
    #[error("{0}")]
    Transport(#[source] BoxError),
}

impl FetchFailure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchFailure::Aborted(AbortReason::Timeout) => ErrorKind::Timeout,
            FetchFailure::Aborted(AbortReason::Cancel(_)) => ErrorKind::Aborted,
            FetchFailure::Transport(_) => ErrorKind::Transport,
        }
    }
}

/// A failed fetch call with its full context.
///
/// The message follows the shape `[METHOD] "URL": STATUS STATUS_TEXT CAUSE`
/// with `<no response>` standing in for the status segment when the
/// transport never produced a response. The originating request, the
/// resolved options, and the error response (including its decoded body)
/// are carried along for inspection.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct FetchError {
    message: String,
    kind: ErrorKind,
    method: Method,
    url: String,
    request: FetchRequest,
    options: ResolvedOptions,
    response: Option<FetchResponse>,
    #[source]
    cause: Option<FetchFailure>,
}

impl FetchError {
    /// Builds the normalized error from a failed call context.
    pub(crate) fn from_context(ctx: FetchContext) -> Self {
        let FetchContext {
            request,
            options,
            response,
            error,
            ..
        } = ctx;

        let method = request
            .method()
            .cloned()
            .unwrap_or_else(|| options.method.clone());
        let url = request.url_string();

        let status_segment = match &response {
            Some(r) => format_status(r.status, &r.status_text),
            None => "<no response>".to_string(),
        };
        let cause_segment = match &error {
            Some(failure) => {
                let text = failure.to_string();
                if text.is_empty() {
                    String::new()
                } else {
                    format!(" {}", text)
                }
            }
            None => String::new(),
        };
        let message = format!("[{}] {:?}: {}{}", method, url, status_segment, cause_segment);

        let kind = error
            .as_ref()
            .map(FetchFailure::kind)
            .unwrap_or(ErrorKind::Status);

        Self {
            message,
            kind,
            method,
            url,
            request,
            options,
            response,
            cause: error,
        }
    }

    /// What ended the call.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The effective request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URL in string form.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The originating request.
    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    /// The resolved options the failed call ran with.
    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// The error response, when the transport produced one.
    pub fn response(&self) -> Option<&FetchResponse> {
        self.response.as_ref()
    }

    /// The decoded body of the error response.
    ///
    /// Error responses are decoded exactly like successful ones, so a JSON
    /// API's error payload is available here.
    pub fn data(&self) -> Option<&ResponseData> {
        self.response.as_ref()?.data.as_ref()
    }

    /// The response status, when a response exists.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }

    /// The response's reason phrase, when a response exists.
    pub fn status_text(&self) -> Option<&str> {
        self.response.as_ref().map(|r| r.status_text.as_str())
    }

    /// Legacy alias for [`status`](Self::status), as a bare number.
    pub fn status_code(&self) -> Option<u16> {
        self.status().map(|s| s.as_u16())
    }

    /// Legacy alias for [`status_text`](Self::status_text).
    pub fn status_message(&self) -> Option<&str> {
        self.status_text()
    }
}

fn format_status(status: StatusCode, status_text: &str) -> String {
    if status_text.is_empty() {
        status.as_u16().to_string()
    } else {
        format!("{} {}", status.as_u16(), status_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{resolve, FetchOptions};
    use http::HeaderMap;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    fn context(method: Method, url: &str) -> FetchContext {
        let request = FetchRequest::Url(url.to_string());
        let options = resolve(
            &request,
            FetchOptions::new().method(method),
            &FetchOptions::new(),
        );
        FetchContext {
            request,
            options,
            response: None,
            error: None,
            attempt: 1,
        }
    }

    fn error_response(status: StatusCode, data: Option<ResponseData>) -> FetchResponse {
        FetchResponse {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: HeaderMap::new(),
            url: Url::parse("https://api.example.com/fail").unwrap(),
            data,
            attempts: 1,
            latency: Duration::from_millis(2),
        }
    }

    #[test]
    fn status_failures_compose_the_full_message() {
        let mut ctx = context(Method::POST, "https://api.example.com/fail");
        ctx.response = Some(error_response(StatusCode::FORBIDDEN, None));

        let error = FetchError::from_context(ctx);
        assert_eq!(
            error.to_string(),
            "[POST] \"https://api.example.com/fail\": 403 Forbidden"
        );
        assert_eq!(error.kind(), ErrorKind::Status);
        assert_eq!(error.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(error.status_text(), Some("Forbidden"));
        assert_eq!(error.status_code(), Some(403));
        assert_eq!(error.status_message(), Some("Forbidden"));
    }

    #[test]
    fn transport_failures_report_no_response() {
        let mut ctx = context(Method::GET, "https://api.example.com/x");
        ctx.error = Some(FetchFailure::Transport("connection refused".into()));

        let error = FetchError::from_context(ctx);
        assert_eq!(
            error.to_string(),
            "[GET] \"https://api.example.com/x\": <no response> connection refused"
        );
        assert_eq!(error.kind(), ErrorKind::Transport);
        assert_eq!(error.status(), None);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn timeout_and_cancel_failures_keep_their_kind() {
        let mut ctx = context(Method::GET, "https://api.example.com/slow");
        ctx.error = Some(FetchFailure::Aborted(AbortReason::Timeout));
        let error: Error = FetchError::from_context(ctx).into();
        assert!(error.is_timeout());
        assert!(!error.is_aborted());

        let mut ctx = context(Method::GET, "https://api.example.com/slow");
        ctx.error = Some(FetchFailure::Aborted(AbortReason::Cancel(None)));
        let error: Error = FetchError::from_context(ctx).into();
        assert!(error.is_aborted());
        assert!(!error.is_timeout());
    }

    #[test]
    fn decoded_error_bodies_are_exposed() {
        let mut ctx = context(Method::GET, "https://api.example.com/fail");
        ctx.response = Some(error_response(
            StatusCode::NOT_FOUND,
            Some(ResponseData::Json(json!({ "a": 1 }))),
        ));

        let error = FetchError::from_context(ctx);
        assert_eq!(error.data().unwrap().as_json(), Some(&json!({ "a": 1 })));
        assert_eq!(
            error.response().unwrap().data.as_ref().unwrap().as_json(),
            Some(&json!({ "a": 1 }))
        );
    }

    #[test]
    fn prepared_requests_use_their_own_method_in_the_message() {
        let prepared = crate::request::PreparedRequest::new(
            Method::PUT,
            Url::parse("https://api.example.com/items/1").unwrap(),
        );
        let request = FetchRequest::Prepared(prepared);
        // The option layer says POST, but the descriptor's method wins in
        // the message.
        let mut options = resolve(&request, FetchOptions::new(), &FetchOptions::new());
        options.method = Method::POST;
        let ctx = FetchContext {
            request,
            options,
            response: Some(error_response(StatusCode::BAD_GATEWAY, None)),
            error: None,
            attempt: 1,
        };

        let error = FetchError::from_context(ctx);
        assert!(error.to_string().starts_with("[PUT] "));
    }

    #[test]
    fn error_status_accessor_reads_through_the_enum() {
        let mut ctx = context(Method::GET, "https://api.example.com/fail");
        ctx.response = Some(error_response(StatusCode::SERVICE_UNAVAILABLE, None));
        let error: Error = FetchError::from_context(ctx).into();
        assert_eq!(error.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(error.as_fetch().is_some());

        let config = Error::Config("bad header".to_string());
        assert_eq!(config.status(), None);
        assert!(config.as_fetch().is_none());
    }
}
