//! The client and its pipeline: resolve options, run hooks, assemble the
//! URL, send, decode, and retry.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use tokio::time::Sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::abort::{AbortReason, AbortSignal};
use crate::body::{self, Body};
use crate::context::FetchContext;
use crate::decode::{self, DecodeFailure};
use crate::error::{BoxError, Error, FetchError, FetchFailure, HookStage, Result};
use crate::hooks::{run_hooks, FetchHook};
use crate::options::{merge_defaults, resolve, FetchOptions};
use crate::request::{apply_base, FetchRequest};
use crate::response::FetchResponse;
use crate::retry::{self, Retry, RetryDelay};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

/// An HTTP client with layered defaults, lifecycle hooks and automatic
/// retries.
///
/// A `Client` is cheap to clone; clones share the transport and the default
/// options. Build one with [`Client::builder`], or run it on a custom
/// [`Transport`] through [`ClientBuilder::build_with`].
///
/// # Examples
///
/// ```no_run
/// use refetch::{Client, FetchOptions};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     login: String,
/// }
///
/// # async fn run() -> Result<(), refetch::Error> {
/// let client = Client::builder()
///     .base_url("https://api.github.com")?
///     .default_header("user-agent", "refetch")?
///     .build()?;
///
/// let user: User = client.fetch("/users/octocat", FetchOptions::new()).await?;
/// println!("{}", user.login);
/// # Ok(())
/// # }
/// ```
pub struct Client<T = HttpTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T> {
    transport: Arc<T>,
    defaults: FetchOptions,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client over a fresh HTTP transport, with no defaults set.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Starts building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T: Transport> Client<T> {
    /// Fetches `request` and decodes the response body into `R`.
    ///
    /// Equivalent to [`fetch_raw`](Self::fetch_raw) followed by
    /// [`FetchResponse::decode`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use refetch::{Client, FetchOptions};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Repo {
    ///     stargazers_count: u32,
    /// }
    ///
    /// # async fn run() -> Result<(), refetch::Error> {
    /// let client = Client::new()?;
    /// let repo: Repo = client
    ///     .fetch("https://api.github.com/repos/rust-lang/rust", FetchOptions::new())
    ///     .await?;
    /// println!("{} stars", repo.stargazers_count);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Everything [`fetch_raw`](Self::fetch_raw) returns, plus
    /// [`Error::Decode`] if the decoded body does not fit `R`.
    pub async fn fetch<R>(
        &self,
        request: impl Into<FetchRequest>,
        options: FetchOptions,
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        self.fetch_raw(request, options).await?.decode()
    }

    /// Executes `request` through the full pipeline and returns the
    /// response with its body already decoded.
    ///
    /// Per attempt the pipeline runs the `on_request` hooks, assembles the
    /// URL, sends the request, decodes the body, runs the `on_response`
    /// hooks, and classifies statuses in `400..600` as failures. Transport
    /// failures, timeouts and retryable statuses consume the retry budget
    /// before the call fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] once retries are exhausted, carrying the
    /// request, the resolved options and the response if one arrived. Hook
    /// failures and custom-parser failures surface as [`Error::Hook`] and
    /// [`Error::Decode`] and are never retried.
    pub async fn fetch_raw(
        &self,
        request: impl Into<FetchRequest>,
        options: FetchOptions,
    ) -> Result<FetchResponse> {
        let request = request.into();
        let options = resolve(&request, options, &self.inner.defaults);
        let start = Instant::now();
        let mut ctx = FetchContext {
            request,
            options,
            response: None,
            error: None,
            attempt: 1,
        };

        loop {
            match self.run_attempt(&mut ctx, start).await? {
                AttemptOutcome::Done(response) => return Ok(response),
                AttemptOutcome::Failed => {}
            }

            match (&ctx.error, &ctx.response) {
                (Some(failure), _) => warn!(
                    error = %failure,
                    attempt = ctx.attempt,
                    method = %ctx.options.method,
                    "Request failed"
                ),
                (None, Some(response)) => warn!(
                    status = response.status.as_u16(),
                    attempt = ctx.attempt,
                    method = %ctx.options.method,
                    "Request failed"
                ),
                (None, None) => {}
            }

            let Some(verdict) = retry::evaluate(&ctx) else {
                return Err(FetchError::from_context(ctx).into());
            };

            if verdict.delay > Duration::ZERO {
                info!(
                    delay_ms = verdict.delay.as_millis(),
                    attempt = ctx.attempt,
                    "Retrying request after delay"
                );
                tokio::time::sleep(verdict.delay).await;
            }

            let attempt = ctx.attempt + 1;
            let FetchContext {
                request,
                mut options,
                ..
            } = ctx;
            options.retry = Some(Retry::Limit(verdict.remaining));
            ctx = FetchContext {
                request,
                options,
                response: None,
                error: None,
                attempt,
            };
        }
    }

    /// Executes a GET request.
    ///
    /// # Errors
    ///
    /// See [`fetch_raw`](Self::fetch_raw).
    pub async fn get(&self, request: impl Into<FetchRequest>) -> Result<FetchResponse> {
        self.fetch_raw(request, FetchOptions::new().method(Method::GET))
            .await
    }

    /// Executes a POST request carrying `body`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use refetch::Client;
    /// use serde_json::json;
    ///
    /// # async fn run() -> Result<(), refetch::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let response = client.post("/users", json!({ "name": "ferris" })).await?;
    /// println!("created: {}", response.status);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`fetch_raw`](Self::fetch_raw).
    pub async fn post(
        &self,
        request: impl Into<FetchRequest>,
        body: impl Into<Body>,
    ) -> Result<FetchResponse> {
        self.fetch_raw(request, FetchOptions::new().method(Method::POST).body(body))
            .await
    }

    /// Executes a PUT request carrying `body`.
    ///
    /// # Errors
    ///
    /// See [`fetch_raw`](Self::fetch_raw).
    pub async fn put(
        &self,
        request: impl Into<FetchRequest>,
        body: impl Into<Body>,
    ) -> Result<FetchResponse> {
        self.fetch_raw(request, FetchOptions::new().method(Method::PUT).body(body))
            .await
    }

    /// Executes a PATCH request carrying `body`.
    ///
    /// # Errors
    ///
    /// See [`fetch_raw`](Self::fetch_raw).
    pub async fn patch(
        &self,
        request: impl Into<FetchRequest>,
        body: impl Into<Body>,
    ) -> Result<FetchResponse> {
        self.fetch_raw(request, FetchOptions::new().method(Method::PATCH).body(body))
            .await
    }

    /// Executes a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`fetch_raw`](Self::fetch_raw).
    pub async fn delete(&self, request: impl Into<FetchRequest>) -> Result<FetchResponse> {
        self.fetch_raw(request, FetchOptions::new().method(Method::DELETE))
            .await
    }

    /// Sends a raw [`TransportRequest`] on this client's transport,
    /// bypassing option resolution, hooks, decoding and retries.
    ///
    /// # Errors
    ///
    /// Returns the transport's error untouched.
    pub async fn native(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, BoxError> {
        self.inner.transport.send(request).await
    }

    /// Derives a client with `options` layered over this one's defaults.
    ///
    /// The derived client shares this client's transport. Headers and query
    /// pairs merge entry-wise with the newer value winning; every other
    /// option overrides wholesale. The parent client is left untouched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use refetch::{Client, FetchOptions};
    ///
    /// # async fn run() -> Result<(), refetch::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let authed = client.create(FetchOptions::new().header("authorization", "Bearer token")?);
    /// let me = authed.get("/me").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create(&self, options: FetchOptions) -> Client<T> {
        Client {
            inner: Arc::new(ClientInner {
                transport: Arc::clone(&self.inner.transport),
                defaults: merge_defaults(options, &self.inner.defaults),
            }),
        }
    }

    /// Runs one attempt end to end, leaving failures in the context for the
    /// retry handler.
    async fn run_attempt(&self, ctx: &mut FetchContext, start: Instant) -> Result<AttemptOutcome> {
        let on_request = ctx.options.hooks.on_request.clone();
        run_hooks(&on_request, HookStage::OnRequest, ctx).await?;

        let url = assemble_url(ctx)?;
        body::prepare(&mut ctx.options)?;

        let transport_request = match body::materialize(&ctx.options.body) {
            Ok(transport_body) => TransportRequest {
                method: ctx.options.method.clone(),
                url,
                headers: ctx.options.headers.clone(),
                body: transport_body,
            },
            Err(failure) => return fail_request_phase(ctx, failure).await,
        };

        let signal = ctx.options.signal.clone();
        // An external signal owns cancellation outright; the timeout timer is
        // armed only without one, and spans both the send and the body read.
        let mut timer = match (&signal, ctx.options.timeout) {
            (None, Some(timeout)) => Some(Box::pin(tokio::time::sleep(timeout))),
            _ => None,
        };

        debug!(
            method = %transport_request.method,
            url = %transport_request.url,
            attempt = ctx.attempt,
            "Executing HTTP request"
        );

        let raw = match race(self.inner.transport.send(transport_request), &signal, &mut timer)
            .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(source)) => {
                return fail_request_phase(ctx, FetchFailure::Transport(source)).await
            }
            Err(failure) => return fail_request_phase(ctx, failure).await,
        };

        let latency = start.elapsed();
        let (mut shell, body_stream) = FetchResponse::from_transport(raw, ctx.attempt, latency);
        info!(
            status = shell.status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = ctx.attempt,
            "Received HTTP response"
        );

        if decode::has_decodable_body(&ctx.options.method, shell.status) {
            let parser = ctx.options.parse_response.clone();
            let kind =
                decode::choose_kind(ctx.options.response_type, parser.as_ref(), &shell.headers);
            let decoding = decode::decode_body(kind, parser.as_ref(), body_stream);
            match race(decoding, &signal, &mut timer).await {
                Ok(Ok(data)) => shell.data = Some(data),
                Ok(Err(DecodeFailure::Read(source))) => {
                    ctx.response = Some(shell);
                    ctx.error = Some(FetchFailure::Transport(source));
                    return Ok(AttemptOutcome::Failed);
                }
                Ok(Err(DecodeFailure::Parse(source))) => return Err(Error::Decode(source)),
                Err(failure) => {
                    ctx.response = Some(shell);
                    ctx.error = Some(failure);
                    return Ok(AttemptOutcome::Failed);
                }
            }
        }

        ctx.response = Some(shell);
        let on_response = ctx.options.hooks.on_response.clone();
        run_hooks(&on_response, HookStage::OnResponse, ctx).await?;

        // Hooks may have swapped the response out; classify what is there now.
        let error_status = ctx
            .response
            .as_ref()
            .is_some_and(|response| (400..600).contains(&response.status.as_u16()));
        if error_status && !ctx.options.ignore_response_error {
            let on_response_error = ctx.options.hooks.on_response_error.clone();
            run_hooks(&on_response_error, HookStage::OnResponseError, ctx).await?;
            return Ok(AttemptOutcome::Failed);
        }

        match ctx.response.take() {
            Some(response) => Ok(AttemptOutcome::Done(response)),
            None => Err(Error::Config(
                "response removed from context by an on_response hook".to_string(),
            )),
        }
    }
}

/// What one attempt produced: a finished response, or a context populated
/// with the failure for the retry handler to inspect.
enum AttemptOutcome {
    Done(FetchResponse),
    Failed,
}

/// Assembles the attempt's URL: applies the base, parses, appends the
/// merged query pairs, and writes the result back into the context so hooks
/// and retries observe the URL actually sent.
///
/// Prepared requests already carry a parsed URL and pass through untouched.
fn assemble_url(ctx: &mut FetchContext) -> Result<Url> {
    match &ctx.request {
        FetchRequest::Url(raw) => {
            let raw = raw.clone();
            let target = apply_base(&raw, ctx.options.base_url.as_deref());
            let mut url = Url::parse(&target)?;
            if !ctx.options.query.is_empty() {
                let pairs: Vec<(String, String)> = ctx.options.query.drain(..).collect();
                url.query_pairs_mut().extend_pairs(&pairs);
            }
            ctx.request = FetchRequest::Url(url.to_string());
            Ok(url)
        }
        FetchRequest::Prepared(prepared) => Ok(prepared.url.clone()),
    }
}

/// Records a request-phase failure and runs the `on_request_error` hooks.
async fn fail_request_phase(
    ctx: &mut FetchContext,
    failure: FetchFailure,
) -> Result<AttemptOutcome> {
    ctx.error = Some(failure);
    let on_request_error = ctx.options.hooks.on_request_error.clone();
    run_hooks(&on_request_error, HookStage::OnRequestError, ctx).await?;
    Ok(AttemptOutcome::Failed)
}

/// Races `work` against the external abort signal or, absent one, the
/// attempt's timeout timer.
async fn race<F>(
    work: F,
    signal: &Option<AbortSignal>,
    timer: &mut Option<Pin<Box<Sleep>>>,
) -> std::result::Result<F::Output, FetchFailure>
where
    F: Future,
{
    tokio::pin!(work);
    match (signal, timer) {
        (Some(signal), _) => tokio::select! {
            output = &mut work => Ok(output),
            reason = signal.aborted() => Err(FetchFailure::Aborted(reason)),
        },
        (None, Some(timer)) => tokio::select! {
            output = &mut work => Ok(output),
            _ = timer.as_mut() => Err(FetchFailure::Aborted(AbortReason::Timeout)),
        },
        (None, None) => Ok(work.await),
    }
}

/// Builder for [`Client`].
///
/// # Examples
///
/// ```no_run
/// use refetch::{Client, RetryDelay};
/// use std::time::Duration;
///
/// # fn run() -> Result<(), refetch::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .default_header("authorization", "Bearer token")?
///     .timeout(Duration::from_secs(10))
///     .retry(3)
///     .retry_delay(RetryDelay::exponential(
///         Duration::from_millis(250),
///         Duration::from_secs(10),
///         true,
///     ))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    defaults: FetchOptions,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Creates a builder with no defaults set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL that relative request paths are joined onto.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid absolute URL.
    pub fn base_url(mut self, base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref();
        Url::parse(base_url)?;
        self.defaults.base_url = Some(base_url.to_string());
        Ok(self)
    }

    /// Adds a header sent with every request unless overridden per call.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("Invalid header value: {}", e)))?;
        self.defaults.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Some(timeout);
        self
    }

    /// Sets the default retry budget.
    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.defaults.retry = Some(retry.into());
        self
    }

    /// Sets the default delay policy between retries.
    pub fn retry_delay(mut self, delay: impl Into<RetryDelay>) -> Self {
        self.defaults.retry_delay = Some(delay.into());
        self
    }

    /// Replaces the set of status codes that trigger a retry.
    pub fn retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.defaults.retry_status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Registers a hook that runs before every request.
    pub fn on_request<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.defaults.hooks.on_request.push(Arc::new(hook));
        self
    }

    /// Registers a hook that runs when a request fails before a response
    /// arrives.
    pub fn on_request_error<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.defaults.hooks.on_request_error.push(Arc::new(hook));
        self
    }

    /// Registers a hook that runs after every decoded response.
    pub fn on_response<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.defaults.hooks.on_response.push(Arc::new(hook));
        self
    }

    /// Registers a hook that runs when a response carries an error status.
    pub fn on_response_error<H: FetchHook + 'static>(mut self, hook: H) -> Self {
        self.defaults.hooks.on_response_error.push(Arc::new(hook));
        self
    }

    /// Layers a full [`FetchOptions`] over the defaults collected so far.
    pub fn defaults(mut self, options: FetchOptions) -> Self {
        self.defaults = merge_defaults(options, &self.defaults);
        self
    }

    /// Runs the client on an existing [`reqwest::Client`], keeping its
    /// connection pool and TLS configuration.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds a client over the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let transport = match self.http_client {
            Some(client) => HttpTransport::with_client(client),
            None => HttpTransport::new()?,
        };
        Ok(Client {
            inner: Arc::new(ClientInner {
                transport: Arc::new(transport),
                defaults: self.defaults,
            }),
        })
    }

    /// Builds a client over a custom transport.
    pub fn build_with<U: Transport>(self, transport: U) -> Client<U> {
        Client {
            inner: Arc::new(ClientInner {
                transport: Arc::new(transport),
                defaults: self.defaults,
            }),
        }
    }
}
