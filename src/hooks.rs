//! Request and response interceptors.
//!
//! Hooks observe and mutate the in-flight [`FetchContext`] at four points:
//! before the request is sent, after a response arrives, and when either
//! phase fails. On retried calls every hook runs again for each attempt.

use crate::context::FetchContext;
use crate::error::{BoxError, Error, HookStage};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A hook invoked during the request lifecycle.
///
/// Plain closures of the shape `Fn(&mut FetchContext) -> Result<(), BoxError>`
/// implement this trait, so most hooks need no explicit impl. Implement the
/// trait directly when the hook has to await something.
///
/// A hook returning `Err` aborts the call immediately with
/// [`Error::Hook`]; no retry is attempted.
///
/// # Examples
///
/// ```no_run
/// use refetch::{Client, FetchContext};
///
/// # fn example() -> Result<(), refetch::Error> {
/// let client = Client::builder()
///     .on_request(|ctx: &mut FetchContext| {
///         ctx.options.headers.insert(
///             http::header::AUTHORIZATION,
///             http::HeaderValue::from_static("Bearer token"),
///         );
///         Ok(())
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FetchHook: Send + Sync {
    async fn run(&self, ctx: &mut FetchContext) -> Result<(), BoxError>;
}

#[async_trait]
impl<F> FetchHook for F
where
    F: Fn(&mut FetchContext) -> Result<(), BoxError> + Send + Sync,
{
    async fn run(&self, ctx: &mut FetchContext) -> Result<(), BoxError> {
        (self)(ctx)
    }
}

/// The hook lists for each lifecycle stage.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_request: Vec<Arc<dyn FetchHook>>,
    pub on_request_error: Vec<Arc<dyn FetchHook>>,
    pub on_response: Vec<Arc<dyn FetchHook>>,
    pub on_response_error: Vec<Arc<dyn FetchHook>>,
}

impl Hooks {
    pub(crate) fn is_empty(&self) -> bool {
        self.on_request.is_empty()
            && self.on_request_error.is_empty()
            && self.on_response.is_empty()
            && self.on_response_error.is_empty()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_request", &self.on_request.len())
            .field("on_request_error", &self.on_request_error.len())
            .field("on_response", &self.on_response.len())
            .field("on_response_error", &self.on_response_error.len())
            .finish()
    }
}

/// Runs every hook in order, stopping at the first failure.
pub(crate) async fn run_hooks(
    hooks: &[Arc<dyn FetchHook>],
    stage: HookStage,
    ctx: &mut FetchContext,
) -> crate::Result<()> {
    for hook in hooks {
        hook.run(ctx)
            .await
            .map_err(|source| Error::Hook { stage, source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{resolve, FetchOptions};
    use crate::request::FetchRequest;

    fn context() -> FetchContext {
        let request = FetchRequest::Url("https://api.example.com/x".to_string());
        let options = resolve(&request, FetchOptions::new(), &FetchOptions::new());
        FetchContext {
            request,
            options,
            response: None,
            error: None,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn closures_run_as_hooks_and_mutate_the_context() {
        let hook: Arc<dyn FetchHook> = Arc::new(|ctx: &mut FetchContext| {
            ctx.options.headers.insert(
                http::header::USER_AGENT,
                http::HeaderValue::from_static("refetch-test"),
            );
            Ok(())
        });
        let mut ctx = context();
        run_hooks(&[hook], HookStage::OnRequest, &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            ctx.options.headers.get(http::header::USER_AGENT).unwrap(),
            "refetch-test"
        );
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order() {
        let first: Arc<dyn FetchHook> = Arc::new(|ctx: &mut FetchContext| {
            ctx.options.query.push(("order".to_string(), "1".to_string()));
            Ok(())
        });
        let second: Arc<dyn FetchHook> = Arc::new(|ctx: &mut FetchContext| {
            ctx.options.query.push(("order".to_string(), "2".to_string()));
            Ok(())
        });
        let mut ctx = context();
        run_hooks(&[first, second], HookStage::OnRequest, &mut ctx)
            .await
            .unwrap();
        let order: Vec<&str> = ctx.options.query.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(order, ["1", "2"]);
    }

    #[tokio::test]
    async fn a_failing_hook_stops_the_chain() {
        let failing: Arc<dyn FetchHook> = Arc::new(|_: &mut FetchContext| -> Result<(), BoxError> {
            Err("hook exploded".into())
        });
        let after: Arc<dyn FetchHook> = Arc::new(|ctx: &mut FetchContext| {
            ctx.options.query.push(("ran".to_string(), "yes".to_string()));
            Ok(())
        });
        let mut ctx = context();
        let err = run_hooks(&[failing, after], HookStage::OnResponse, &mut ctx)
            .await
            .unwrap_err();
        match err {
            Error::Hook { stage, source } => {
                assert_eq!(stage, HookStage::OnResponse);
                assert_eq!(source.to_string(), "hook exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ctx.options.query.is_empty());
    }

    #[tokio::test]
    async fn async_hooks_implement_the_trait_directly() {
        struct Slow;

        #[async_trait]
        impl FetchHook for Slow {
            async fn run(&self, ctx: &mut FetchContext) -> Result<(), BoxError> {
                tokio::task::yield_now().await;
                ctx.attempt += 10;
                Ok(())
            }
        }

        let mut ctx = context();
        run_hooks(&[Arc::new(Slow) as Arc<dyn FetchHook>], HookStage::OnRequest, &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.attempt, 11);
    }
}
