//! Mutable per-call state shared with hooks.

use crate::error::FetchFailure;
use crate::options::ResolvedOptions;
use crate::request::FetchRequest;
use crate::response::FetchResponse;

/// The in-flight state of a single call, visible to every hook.
///
/// `on_request` hooks see the request before the URL is assembled and may
/// still change options such as the query, headers or body. `on_response`
/// hooks see the decoded response in `response`. The two error-stage hooks
/// find the failure in `error`; `on_response_error` additionally sees the
/// error response in `response`.
#[derive(Debug)]
pub struct FetchContext {
    /// The request as passed in. Once the base URL and query have been
    /// applied this holds the assembled URL, so retried attempts do not
    /// apply them twice.
    pub request: FetchRequest,

    /// The fully resolved options for this call.
    pub options: ResolvedOptions,

    /// The response, once one has arrived.
    pub response: Option<FetchResponse>,

    /// The failure that ended the current attempt, if any.
    pub error: Option<FetchFailure>,

    /// 1-based attempt counter.
    pub attempt: u32,
}
