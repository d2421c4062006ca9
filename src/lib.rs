//! # refetch - A better fetch for Rust APIs
//!
//! refetch is a retry-aware HTTP client library built on top of `reqwest`.
//! It resolves layered options, decodes response bodies by content type,
//! runs lifecycle hooks around every attempt, and turns failed calls into
//! errors that still carry the response that caused them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use refetch::{Client, FetchOptions, RetryDelay};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Todo {
//!     id: u32,
//!     title: String,
//!     completed: bool,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), refetch::Error> {
//!     let client = Client::builder()
//!         .base_url("https://jsonplaceholder.typicode.com")?
//!         .timeout(Duration::from_secs(30))
//!         .retry(3)
//!         .retry_delay(RetryDelay::exponential(
//!             Duration::from_millis(100),
//!             Duration::from_secs(10),
//!             true,
//!         ))
//!         .build()?;
//!
//!     // Typed fetch: joins the path onto the base URL and decodes JSON.
//!     let todo: Todo = client.fetch("/todos/1", FetchOptions::new()).await?;
//!     println!("todo #{}: {}", todo.id, todo.title);
//!
//!     // Raw fetch: keeps the status, headers and decoded data together.
//!     let response = client.get("/todos/1").await?;
//!     println!("status: {} after {} attempt(s)", response.status, response.attempts);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Smart defaults** - JSON requests and responses work without
//!   configuration; response bodies are decoded from the `Content-Type`
//!   header
//! - **Layered options** - Client defaults, derived clients
//!   ([`Client::create`]) and per-call options merge predictably
//! - **Automatic retries** - Budgeted retries for transport failures and
//!   retryable statuses, with fixed, exponential-backoff, `Retry-After`
//!   aware or fully custom delays
//! - **Lifecycle hooks** - `on_request`, `on_request_error`, `on_response`
//!   and `on_response_error` interceptors that observe and mutate the call
//! - **Timeouts and aborts** - Per-attempt timeouts, and external
//!   cancellation through [`AbortController`]
//! - **Rich errors** - Failed calls keep the method, URL, status and the
//!   decoded body of the response that caused them
//! - **Pluggable transport** - The wire layer is a trait; swap
//!   [`HttpTransport`] for a mock or a custom stack
//! - **Structured logging** - `tracing` instrumentation for requests,
//!   responses and retries
//!
//! ## Error Handling
//!
//! A failed call produces a [`FetchError`] that preserves the server's
//! answer:
//!
//! ```no_run
//! use refetch::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get("/endpoint").await {
//!     Ok(response) => {
//!         println!("Success: {:?}", response.data);
//!     }
//!     Err(Error::Fetch(e)) => {
//!         eprintln!("Call failed: {}", e);
//!         if let Some(data) = e.data() {
//!             eprintln!("  Server said: {:?}", data);
//!         }
//!     }
//!     Err(e) => {
//!         eprintln!("Other error: {}", e);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! Configure which statuses retry and how long to wait between attempts:
//!
//! ```no_run
//! use refetch::{Client, RetryDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), refetch::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .retry(5)
//!     .retry_status_codes([429, 503])
//!     .retry_delay(RetryDelay::retry_after(
//!         Duration::from_secs(1),  // fallback when the header is absent
//!         Duration::from_secs(30), // cap on what the server may ask for
//!     ))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Hooks
//!
//! Hooks run on every attempt and may rewrite the request or inspect the
//! response before the caller sees it:
//!
//! ```no_run
//! use refetch::{Client, FetchContext};
//!
//! # async fn example() -> Result<(), refetch::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .on_request(|ctx: &mut FetchContext| {
//!         println!("-> {} {}", ctx.options.method, ctx.request.url_string());
//!         Ok(())
//!     })
//!     .on_response(|ctx: &mut FetchContext| {
//!         if let Some(response) = &ctx.response {
//!             println!("<- {} in {:?}", response.status, response.latency);
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let health = client.get("/health").await?;
//! # Ok(())
//! # }
//! ```

mod abort;
mod body;
mod client;
mod context;
mod decode;
mod error;
mod hooks;
mod options;
mod request;
mod response;
pub mod retry;
pub mod transport;

pub use abort::{AbortController, AbortReason, AbortSignal};
pub use body::{Body, StreamBody};
pub use client::{Client, ClientBuilder};
pub use context::FetchContext;
pub use decode::detect_response_type;
pub use error::{BoxError, Error, ErrorKind, FetchError, FetchFailure, HookStage, Result};
pub use hooks::{FetchHook, Hooks};
pub use options::{FetchOptions, ParseResponse, ResolvedOptions};
pub use request::{FetchRequest, PreparedRequest};
pub use response::{FetchResponse, ResponseData, ResponseKind};
pub use retry::{Retry, RetryDelay, DEFAULT_RETRY_STATUS_CODES};
pub use transport::{
    ByteStream, HttpTransport, Transport, TransportBody, TransportRequest, TransportResponse,
};
