//! Per-call options and the three-layer option merge.
//!
//! Options arrive in up to three layers: instance defaults, fields carried
//! by a prepared request, and per-call options. [`resolve`] folds them into
//! one [`ResolvedOptions`] before any hook runs. The merge is pure; it does
//! no I/O and cannot fail.

use crate::abort::AbortSignal;
use crate::body::Body;
use crate::error::{BoxError, Error, Result};
use crate::hooks::{FetchHook, Hooks};
use crate::request::FetchRequest;
use crate::response::ResponseKind;
use crate::retry::{Retry, RetryDelay};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A custom response decoder: receives the body text, produces the decoded
/// JSON value.
pub type ParseResponse =
    Arc<dyn Fn(&str) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// Per-call configuration, also used for instance defaults.
///
/// Every field is optional; unset fields fall through to the instance
/// defaults during resolution. Setters are chainable; the two setters that
/// parse caller input (`header`, `json`) are fallible.
///
/// # Examples
///
/// ```
/// use refetch::{FetchOptions, RetryDelay};
/// use std::time::Duration;
///
/// let options = FetchOptions::new()
///     .method(http::Method::POST)
///     .query("page", "2")
///     .retry(2)
///     .retry_delay(RetryDelay::fixed(Duration::from_millis(250)))
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Clone, Default)]
pub struct FetchOptions {
    pub(crate) base_url: Option<String>,
    pub(crate) method: Option<Method>,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) body: Option<Body>,
    pub(crate) response_type: Option<ResponseKind>,
    pub(crate) parse_response: Option<ParseResponse>,
    pub(crate) ignore_response_error: Option<bool>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry: Option<Retry>,
    pub(crate) retry_delay: Option<RetryDelay>,
    pub(crate) retry_status_codes: Option<Vec<u16>>,
    pub(crate) signal: Option<AbortSignal>,
    pub(crate) hooks: Hooks,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL applied to relative request URLs.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the request method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a single header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the full header map for this layer.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Appends one query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends one query parameter through the legacy `params` alias.
    ///
    /// `params` and `query` feed the same merged set; on a key conflict
    /// within the same layer, `query` wins.
    pub fn params(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON request body serialized from `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` fails to serialize.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Some(Body::json(value)?);
        Ok(self)
    }

    /// Forces the response decode kind instead of content-type detection.
    pub fn response_type(mut self, kind: ResponseKind) -> Self {
        self.response_type = Some(kind);
        self
    }

    /// Installs a custom response decoder.
    ///
    /// The decoder receives the body text and fills the JSON data slot; its
    /// failure fails the call without retry.
    pub fn parse_response<F>(mut self, parse: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.parse_response = Some(Arc::new(parse));
        self
    }

    /// When set, 4xx/5xx responses resolve normally instead of failing.
    pub fn ignore_response_error(mut self, ignore: bool) -> Self {
        self.ignore_response_error = Some(ignore);
        self
    }

    /// Sets the per-attempt timeout, covering the transport call and the
    /// body decode.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry budget. Overrides the method-based default
    /// (one retry for GET-like methods, none for payload methods).
    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    /// Sets the delay between retry attempts.
    pub fn retry_delay(mut self, delay: impl Into<RetryDelay>) -> Self {
        self.retry_delay = Some(delay.into());
        self
    }

    /// Replaces the set of statuses eligible for retry.
    pub fn retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Attaches an external cancellation signal.
    ///
    /// When a signal is attached the per-attempt `timeout` is not armed;
    /// the signal owns cancellation.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Registers a hook that runs before each attempt is sent.
    pub fn on_request<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.on_request.push(Arc::new(hook));
        self
    }

    /// Registers a hook that runs when the transport call fails.
    pub fn on_request_error<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.on_request_error.push(Arc::new(hook));
        self
    }

    /// Registers a hook that runs once a response has been decoded.
    pub fn on_response<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.on_response.push(Arc::new(hook));
        self
    }

    /// Registers a hook that runs when a response has an error status.
    pub fn on_response_error<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.on_response_error.push(Arc::new(hook));
        self
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("base_url", &self.base_url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("response_type", &self.response_type)
            .field("parse_response", &self.parse_response.as_ref().map(|_| "_"))
            .field("ignore_response_error", &self.ignore_response_error)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("retry_status_codes", &self.retry_status_codes)
            .field("signal", &self.signal)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Options after the three-layer merge.
///
/// Hooks receive this through [`FetchContext`](crate::FetchContext) and may
/// mutate it; the method, headers and error-status policy are concrete by
/// this point.
pub struct ResolvedOptions {
    pub base_url: Option<String>,
    pub method: Method,
    pub headers: HeaderMap,
    /// Merged query pairs. Drained once they have been applied to the URL,
    /// so a retried attempt does not append them twice.
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub response_type: Option<ResponseKind>,
    pub parse_response: Option<ParseResponse>,
    pub ignore_response_error: bool,
    pub timeout: Option<Duration>,
    /// Stays unset through resolution so the retry handler can apply the
    /// method-sensitive default.
    pub retry: Option<Retry>,
    pub retry_delay: RetryDelay,
    pub retry_status_codes: Option<Vec<u16>>,
    pub signal: Option<AbortSignal>,
    pub hooks: Hooks,
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("base_url", &self.base_url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("response_type", &self.response_type)
            .field("parse_response", &self.parse_response.as_ref().map(|_| "_"))
            .field("ignore_response_error", &self.ignore_response_error)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("retry_status_codes", &self.retry_status_codes)
            .field("signal", &self.signal)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Merges defaults, prepared-request fields and per-call options.
///
/// Precedence per concern:
///
/// - headers: defaults, then the prepared request's headers, then per-call
///   headers; a written name replaces all earlier values for that name.
/// - query: `params` then `query` within each layer, defaults before
///   per-call; later entries replace earlier ones key-wise.
/// - method: per-call, else defaults, else the prepared request's method,
///   else GET.
/// - hooks: per slot, a non-empty per-call list replaces the defaults'.
/// - everything else: per-call value if present, else default.
pub(crate) fn resolve(
    request: &FetchRequest,
    options: FetchOptions,
    defaults: &FetchOptions,
) -> ResolvedOptions {
    let mut headers = HeaderMap::new();
    overlay_headers(&mut headers, &defaults.headers);
    if let FetchRequest::Prepared(prepared) = request {
        overlay_headers(&mut headers, &prepared.headers);
    }
    overlay_headers(&mut headers, &options.headers);

    let mut query = Vec::new();
    upsert_pairs(&mut query, &defaults.params);
    upsert_pairs(&mut query, &defaults.query);
    upsert_pairs(&mut query, &options.params);
    upsert_pairs(&mut query, &options.query);

    let method = options
        .method
        .or_else(|| defaults.method.clone())
        .or_else(|| request.method().cloned())
        .unwrap_or(Method::GET);

    ResolvedOptions {
        base_url: options.base_url.or_else(|| defaults.base_url.clone()),
        method,
        headers,
        query,
        body: options.body.or_else(|| defaults.body.clone()),
        response_type: options.response_type.or(defaults.response_type),
        parse_response: options
            .parse_response
            .or_else(|| defaults.parse_response.clone()),
        ignore_response_error: options
            .ignore_response_error
            .or(defaults.ignore_response_error)
            .unwrap_or(false),
        timeout: options.timeout.or(defaults.timeout),
        retry: options.retry.or(defaults.retry),
        retry_delay: options
            .retry_delay
            .or_else(|| defaults.retry_delay.clone())
            .unwrap_or_default(),
        retry_status_codes: options
            .retry_status_codes
            .or_else(|| defaults.retry_status_codes.clone()),
        signal: options.signal.or_else(|| defaults.signal.clone()),
        hooks: merge_hooks(options.hooks, &defaults.hooks),
    }
}

/// Deep-merges new defaults over existing ones for derived instances.
/// Headers and query pairs union field-wise with the newer value winning;
/// everything else is simple override.
pub(crate) fn merge_defaults(newer: FetchOptions, older: &FetchOptions) -> FetchOptions {
    let mut headers = older.headers.clone();
    overlay_headers(&mut headers, &newer.headers);

    let mut query = older.query.clone();
    upsert_pairs(&mut query, &newer.query);
    let mut params = older.params.clone();
    upsert_pairs(&mut params, &newer.params);

    FetchOptions {
        base_url: newer.base_url.or_else(|| older.base_url.clone()),
        method: newer.method.or_else(|| older.method.clone()),
        headers,
        query,
        params,
        body: newer.body.or_else(|| older.body.clone()),
        response_type: newer.response_type.or(older.response_type),
        parse_response: newer
            .parse_response
            .or_else(|| older.parse_response.clone()),
        ignore_response_error: newer
            .ignore_response_error
            .or(older.ignore_response_error),
        timeout: newer.timeout.or(older.timeout),
        retry: newer.retry.or(older.retry),
        retry_delay: newer.retry_delay.or_else(|| older.retry_delay.clone()),
        retry_status_codes: newer
            .retry_status_codes
            .or_else(|| older.retry_status_codes.clone()),
        signal: newer.signal.or_else(|| older.signal.clone()),
        hooks: merge_hooks(newer.hooks, &older.hooks),
    }
}

/// Field-wise header overlay: names written by `layer` replace all earlier
/// values for that name, while multiple values within `layer` survive.
fn overlay_headers(merged: &mut HeaderMap, layer: &HeaderMap) {
    for name in layer.keys() {
        merged.remove(name);
    }
    for (name, value) in layer {
        merged.append(name.clone(), value.clone());
    }
}

/// Key-wise upsert preserving first-seen key order.
fn upsert_pairs(into: &mut Vec<(String, String)>, pairs: &[(String, String)]) {
    for (key, value) in pairs {
        match into.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => into.push((key.clone(), value.clone())),
        }
    }
}

fn merge_hooks(call: Hooks, defaults: &Hooks) -> Hooks {
    fn pick(
        call: Vec<Arc<dyn FetchHook>>,
        defaults: &[Arc<dyn FetchHook>],
    ) -> Vec<Arc<dyn FetchHook>> {
        if call.is_empty() {
            defaults.to_vec()
        } else {
            call
        }
    }
    Hooks {
        on_request: pick(call.on_request, &defaults.on_request),
        on_request_error: pick(call.on_request_error, &defaults.on_request_error),
        on_response: pick(call.on_response, &defaults.on_response),
        on_response_error: pick(call.on_response_error, &defaults.on_response_error),
    }
}
