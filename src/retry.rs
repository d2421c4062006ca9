//! Retry policy: budgets, status gating, and delay presets.
//!
//! A failed attempt is retried only when three things line up: the failure
//! is not an external cancellation, the remaining budget is positive, and
//! the failed status is in the retryable set. The delay between attempts is
//! a [`RetryDelay`], either a fixed duration or a function of the failed
//! call context; [`RetryDelay::exponential`] and [`RetryDelay::retry_after`]
//! are ready-made computed delays.

use crate::abort::AbortReason;
use crate::body::is_payload_method;
use crate::context::FetchContext;
use crate::error::FetchFailure;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Statuses retried when `retry_status_codes` is not set: request timeout,
/// conflict, too-early, too-many-requests, and the transient 5xx family.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 8] = [408, 409, 425, 429, 500, 502, 503, 504];

/// The retry budget for a call.
///
/// When no budget is set, non-payload methods (GET and friends) get one
/// retry and payload methods (POST/PUT/PATCH/DELETE) get none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Retry up to this many times.
    Limit(u32),
    /// Never retry, regardless of method or status.
    Never,
}

impl From<u32> for Retry {
    fn from(limit: u32) -> Self {
        Retry::Limit(limit)
    }
}

/// The delay between a failed attempt and its retry.
///
/// # Examples
///
/// ```
/// use refetch::RetryDelay;
/// use std::time::Duration;
///
/// // Constant 250 ms between attempts.
/// let fixed = RetryDelay::fixed(Duration::from_millis(250));
///
/// // 100ms, 200ms, 400ms, ... capped at 10s, with jitter.
/// let backoff = RetryDelay::exponential(
///     Duration::from_millis(100),
///     Duration::from_secs(10),
///     true,
/// );
///
/// // Honor the Retry-After response header, waiting at most 30s.
/// let polite = RetryDelay::retry_after(Duration::from_secs(1), Duration::from_secs(30));
/// ```
#[derive(Clone)]
pub enum RetryDelay {
    /// A constant delay.
    Fixed(Duration),
    /// A delay computed from the failed call context.
    Computed(Arc<dyn Fn(&FetchContext) -> Duration + Send + Sync>),
}

impl RetryDelay {
    /// A constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        RetryDelay::Fixed(delay)
    }

    /// A delay computed from the failed call context.
    ///
    /// The context carries the failed response (if any), the failure, and
    /// the 1-based number of the attempt that failed.
    pub fn computed<F>(compute: F) -> Self
    where
        F: Fn(&FetchContext) -> Duration + Send + Sync + 'static,
    {
        RetryDelay::Computed(Arc::new(compute))
    }

    /// Exponentially increasing delays.
    ///
    /// Attempt `n` waits `initial_delay * 2^(n-1)`, capped at `max_delay`.
    /// With `jitter`, each delay is multiplied by a random factor between
    /// 50% and 100% to avoid thundering herds.
    pub fn exponential(initial_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self::computed(move |ctx| {
            let exponent = ctx.attempt.saturating_sub(1).min(31);
            let delay = initial_delay
                .saturating_mul(2u32.saturating_pow(exponent))
                .min(max_delay);
            if jitter {
                let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                delay.mul_f64(jitter_factor)
            } else {
                delay
            }
        })
    }

    /// Honors the failed response's `Retry-After` header.
    ///
    /// Supports both delay-seconds and HTTP-date forms, capped at
    /// `max_wait`. Falls back to `fallback` when the header is absent or
    /// unparseable.
    pub fn retry_after(fallback: Duration, max_wait: Duration) -> Self {
        Self::computed(move |ctx| {
            let header = ctx
                .response
                .as_ref()
                .and_then(|response| response.header(http::header::RETRY_AFTER.as_str()));
            match header.and_then(parse_retry_after) {
                Some(delay) => delay.min(max_wait),
                None => fallback,
            }
        })
    }

    pub(crate) fn delay_for(&self, ctx: &FetchContext) -> Duration {
        match self {
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::Computed(compute) => compute(ctx),
        }
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        RetryDelay::Fixed(Duration::ZERO)
    }
}

impl From<Duration> for RetryDelay {
    fn from(delay: Duration) -> Self {
        RetryDelay::Fixed(delay)
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            RetryDelay::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Parses a `Retry-After` value.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    // Try parsing as seconds (integer)
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Try parsing as HTTP date (RFC 7231 format)
    let date_time = httpdate::parse_http_date(value).ok()?;
    date_time.duration_since(SystemTime::now()).ok()
}

/// The outcome of a positive retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryVerdict {
    /// How long to wait before the next attempt.
    pub delay: Duration,
    /// The budget the next attempt carries.
    pub remaining: u32,
}

/// Decides whether the failed attempt in `ctx` should be retried.
///
/// External cancellations are never retried. The budget comes from the
/// explicit `retry` option, else from the method default. The failed status
/// (500 when no response exists) must pass the retryable-status gate.
pub(crate) fn evaluate(ctx: &FetchContext) -> Option<RetryVerdict> {
    if let Some(FetchFailure::Aborted(AbortReason::Cancel(_))) = &ctx.error {
        return None;
    }

    let budget = match ctx.options.retry {
        Some(Retry::Never) => return None,
        Some(Retry::Limit(limit)) => limit,
        None => {
            if is_payload_method(&ctx.options.method) {
                0
            } else {
                1
            }
        }
    };
    if budget == 0 {
        return None;
    }

    let status = ctx
        .response
        .as_ref()
        .map(|response| response.status.as_u16())
        .unwrap_or(500);
    let retryable = match &ctx.options.retry_status_codes {
        Some(codes) => codes.contains(&status),
        None => DEFAULT_RETRY_STATUS_CODES.contains(&status),
    };
    if !retryable {
        return None;
    }

    Some(RetryVerdict {
        delay: ctx.options.retry_delay.delay_for(ctx),
        remaining: budget - 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{resolve, FetchOptions};
    use crate::request::FetchRequest;
    use crate::response::FetchResponse;
    use http::{HeaderMap, HeaderValue, Method, StatusCode};
    use url::Url;

    fn failed_context(options: FetchOptions, attempt: u32, status: Option<StatusCode>) -> FetchContext {
        let request = FetchRequest::Url("https://api.example.com/x".to_string());
        let options = resolve(&request, options, &FetchOptions::new());
        let response = status.map(|status| FetchResponse {
            status,
            status_text: status
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
            headers: HeaderMap::new(),
            url: Url::parse("https://api.example.com/x").unwrap(),
            data: None,
            attempts: attempt,
            latency: Duration::from_millis(1),
        });
        FetchContext {
            request,
            options,
            response,
            error: None,
            attempt,
        }
    }

    #[test]
    fn exponential_backoff_delays() {
        let delay = RetryDelay::exponential(
            Duration::from_millis(100),
            Duration::from_secs(10),
            false,
        );

        let table = [
            (1, Duration::from_millis(100)),
            (2, Duration::from_millis(200)),
            (3, Duration::from_millis(400)),
            (4, Duration::from_millis(800)),
            (5, Duration::from_millis(1600)),
        ];
        for (attempt, expected) in table {
            let ctx = failed_context(FetchOptions::new(), attempt, None);
            assert_eq!(delay.delay_for(&ctx), expected);
        }

        // Capped at max_delay from attempt 8 onwards.
        let ctx = failed_context(FetchOptions::new(), 12, None);
        assert_eq!(delay.delay_for(&ctx), Duration::from_secs(10));
    }

    #[test]
    fn jittered_backoff_stays_within_half_to_full() {
        let delay = RetryDelay::exponential(
            Duration::from_millis(100),
            Duration::from_secs(10),
            true,
        );
        let ctx = failed_context(FetchOptions::new(), 3, None);
        for _ in 0..50 {
            let d = delay.delay_for(&ctx);
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(400));
        }
    }

    #[test]
    fn fixed_delay_ignores_the_attempt() {
        let delay = RetryDelay::fixed(Duration::from_secs(1));
        for attempt in [1, 2, 9] {
            let ctx = failed_context(FetchOptions::new(), attempt, None);
            assert_eq!(delay.delay_for(&ctx), Duration::from_secs(1));
        }
    }

    #[test]
    fn retry_after_parses_seconds_and_http_dates() {
        assert_eq!(parse_retry_after("60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("soon"), None);

        let future = SystemTime::now() + Duration::from_secs(30);
        let parsed = parse_retry_after(&httpdate::fmt_http_date(future)).unwrap();
        assert!(parsed <= Duration::from_secs(30));
        assert!(parsed >= Duration::from_secs(28));

        let past = SystemTime::now() - Duration::from_secs(30);
        assert_eq!(parse_retry_after(&httpdate::fmt_http_date(past)), None);
    }

    #[test]
    fn retry_after_preset_reads_the_response_header() {
        let delay = RetryDelay::retry_after(Duration::from_secs(1), Duration::from_secs(30));

        let mut ctx = failed_context(
            FetchOptions::new(),
            1,
            Some(StatusCode::TOO_MANY_REQUESTS),
        );
        ctx.response
            .as_mut()
            .unwrap()
            .headers
            .insert(http::header::RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(delay.delay_for(&ctx), Duration::from_secs(3));

        // Capped by max_wait.
        ctx.response
            .as_mut()
            .unwrap()
            .headers
            .insert(http::header::RETRY_AFTER, HeaderValue::from_static("600"));
        assert_eq!(delay.delay_for(&ctx), Duration::from_secs(30));

        // Absent header falls back.
        let ctx = failed_context(FetchOptions::new(), 1, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(delay.delay_for(&ctx), Duration::from_secs(1));
    }

    #[test]
    fn default_budget_depends_on_the_method() {
        let ctx = failed_context(FetchOptions::new(), 1, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            evaluate(&ctx),
            Some(RetryVerdict {
                delay: Duration::ZERO,
                remaining: 0,
            })
        );

        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            let ctx = failed_context(
                FetchOptions::new().method(method),
                1,
                Some(StatusCode::SERVICE_UNAVAILABLE),
            );
            assert_eq!(evaluate(&ctx), None);
        }
    }

    #[test]
    fn explicit_budget_overrides_the_method_default() {
        let ctx = failed_context(
            FetchOptions::new().method(Method::POST).retry(2),
            1,
            Some(StatusCode::SERVICE_UNAVAILABLE),
        );
        assert_eq!(evaluate(&ctx).unwrap().remaining, 1);

        let ctx = failed_context(
            FetchOptions::new().retry(Retry::Never),
            1,
            Some(StatusCode::SERVICE_UNAVAILABLE),
        );
        assert_eq!(evaluate(&ctx), None);
    }

    #[test]
    fn only_retryable_statuses_pass_the_gate() {
        let ctx = failed_context(FetchOptions::new(), 1, Some(StatusCode::NOT_FOUND));
        assert_eq!(evaluate(&ctx), None);

        for code in DEFAULT_RETRY_STATUS_CODES {
            let status = StatusCode::from_u16(code).unwrap();
            let ctx = failed_context(FetchOptions::new(), 1, Some(status));
            assert!(evaluate(&ctx).is_some(), "expected {code} to be retryable");
        }
    }

    #[test]
    fn custom_status_codes_replace_the_default_set() {
        let options = || FetchOptions::new().retry_status_codes([404]);
        let ctx = failed_context(options(), 1, Some(StatusCode::NOT_FOUND));
        assert!(evaluate(&ctx).is_some());

        let ctx = failed_context(options(), 1, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(evaluate(&ctx), None);
    }

    #[test]
    fn a_missing_response_counts_as_500() {
        let mut ctx = failed_context(FetchOptions::new(), 1, None);
        ctx.error = Some(FetchFailure::Transport("connection refused".into()));
        assert!(evaluate(&ctx).is_some());

        // 500 is outside a custom set that excludes it.
        let mut ctx = failed_context(FetchOptions::new().retry_status_codes([503]), 1, None);
        ctx.error = Some(FetchFailure::Transport("connection refused".into()));
        assert_eq!(evaluate(&ctx), None);
    }

    #[test]
    fn external_cancellation_is_never_retried() {
        let mut ctx = failed_context(FetchOptions::new().retry(5), 1, None);
        ctx.error = Some(FetchFailure::Aborted(AbortReason::Cancel(None)));
        assert_eq!(evaluate(&ctx), None);

        ctx.error = Some(FetchFailure::Aborted(AbortReason::Cancel(Some(
            "caller gave up".to_string(),
        ))));
        assert_eq!(evaluate(&ctx), None);
    }

    #[test]
    fn timeout_cancellation_stays_retriable() {
        let mut ctx = failed_context(FetchOptions::new(), 1, None);
        ctx.error = Some(FetchFailure::Aborted(AbortReason::Timeout));
        assert!(evaluate(&ctx).is_some());
    }
}
