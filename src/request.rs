//! Request descriptors: URL strings and prepared requests.

use crate::error::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// What a call is addressed at.
///
/// Most calls pass a URL string, absolute or relative to the configured
/// base URL. A [`PreparedRequest`] carries its own method and headers and is
/// never rewritten by base-URL application or query merging.
#[derive(Debug, Clone)]
pub enum FetchRequest {
    /// A URL string, subject to base-URL application and query merging.
    Url(String),
    /// A prepared request, used as-is.
    Prepared(PreparedRequest),
}

impl FetchRequest {
    /// The URL in string form, as it appears in normalized error messages.
    pub fn url_string(&self) -> String {
        match self {
            FetchRequest::Url(raw) => raw.clone(),
            FetchRequest::Prepared(prepared) => prepared.url.to_string(),
        }
    }

    /// The descriptor's own method, when it carries one.
    pub(crate) fn method(&self) -> Option<&Method> {
        match self {
            FetchRequest::Url(_) => None,
            FetchRequest::Prepared(prepared) => Some(&prepared.method),
        }
    }
}

impl From<&str> for FetchRequest {
    fn from(raw: &str) -> Self {
        FetchRequest::Url(raw.to_string())
    }
}

impl From<String> for FetchRequest {
    fn from(raw: String) -> Self {
        FetchRequest::Url(raw)
    }
}

impl From<&String> for FetchRequest {
    fn from(raw: &String) -> Self {
        FetchRequest::Url(raw.clone())
    }
}

impl From<Url> for FetchRequest {
    fn from(url: Url) -> Self {
        FetchRequest::Url(String::from(url))
    }
}

impl From<PreparedRequest> for FetchRequest {
    fn from(prepared: PreparedRequest) -> Self {
        FetchRequest::Prepared(prepared)
    }
}

/// A fully-addressed request assembled by the caller up front.
///
/// # Examples
///
/// ```
/// use refetch::PreparedRequest;
/// use http::Method;
/// use url::Url;
///
/// # fn example() -> Result<(), refetch::Error> {
/// let request = PreparedRequest::new(
///     Method::POST,
///     Url::parse("https://api.example.com/jobs")?,
/// )
/// .header("x-queue", "default")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl PreparedRequest {
    /// Creates a prepared request with no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Adds a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Config(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Config(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// Joins `input` onto `base` by prefix concatenation, deduplicating the
/// slash at the seam. Inputs that already carry a scheme pass through
/// unchanged, which also makes the join idempotent across retries.
pub(crate) fn apply_base(input: &str, base: Option<&str>) -> String {
    let Some(base) = base else {
        return input.to_string();
    };
    if has_scheme(input) {
        return input.to_string();
    }
    if input.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        input.trim_start_matches('/')
    )
}

fn has_scheme(input: &str) -> bool {
    match input.find("://") {
        Some(idx) if idx > 0 => {
            let scheme = &input[..idx];
            scheme
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_inputs_pass_through() {
        assert_eq!(
            apply_base("https://other.example.com/x", Some("https://api.example.com")),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn joins_with_exactly_one_slash() {
        let base = Some("https://api.example.com/v1/");
        assert_eq!(apply_base("/users", base), "https://api.example.com/v1/users");
        assert_eq!(apply_base("users", base), "https://api.example.com/v1/users");
        assert_eq!(
            apply_base("users", Some("https://api.example.com/v1")),
            "https://api.example.com/v1/users"
        );
    }

    #[test]
    fn empty_input_yields_the_base() {
        assert_eq!(
            apply_base("", Some("https://api.example.com")),
            "https://api.example.com"
        );
    }

    #[test]
    fn no_base_passes_through() {
        assert_eq!(apply_base("/users", None), "/users");
    }

    #[test]
    fn scheme_detection_requires_a_plausible_scheme() {
        assert!(has_scheme("https://example.com"));
        assert!(has_scheme("custom+scheme://example.com"));
        assert!(!has_scheme("://example.com"));
        assert!(!has_scheme("/path://odd"));
        assert!(!has_scheme("users/1"));
    }

    #[test]
    fn prepared_request_rejects_bad_headers() {
        let prepared = PreparedRequest::new(
            Method::GET,
            Url::parse("https://api.example.com/").unwrap(),
        );
        assert!(prepared.header("bad header", "x").is_err());
    }
}
