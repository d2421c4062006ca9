//! Cooperative cancellation of in-flight calls.
//!
//! [`AbortController`] is the trigger side; the [`AbortSignal`] it hands out
//! is passed to calls via [`FetchOptions::signal`](crate::FetchOptions::signal)
//! and observed while the request is in flight. Aborting is idempotent: the
//! first reason wins and later calls are ignored.

use std::fmt;
use tokio::sync::watch;

/// Why a call was torn down before it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The per-call timeout fired.
    Timeout,
    /// The caller aborted, with an optional message.
    Cancel(Option<String>),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout => f.write_str("the operation was aborted due to timeout"),
            AbortReason::Cancel(Some(message)) => f.write_str(message),
            AbortReason::Cancel(None) => f.write_str("the operation was aborted"),
        }
    }
}

/// Trigger for cancelling every call that carries one of its signals.
///
/// # Examples
///
/// ```
/// use refetch::AbortController;
///
/// let controller = AbortController::new();
/// let signal = controller.signal();
///
/// assert!(!signal.is_aborted());
/// controller.abort();
/// assert!(signal.is_aborted());
/// ```
pub struct AbortController {
    tx: watch::Sender<Option<AbortReason>>,
}

impl AbortController {
    /// Creates a controller whose signal has not fired.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Returns a signal observing this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Aborts every call observing this controller.
    pub fn abort(&self) {
        self.fire(AbortReason::Cancel(None));
    }

    /// Aborts with a message that ends up in the resulting error.
    pub fn abort_with(&self, message: impl Into<String>) {
        self.fire(AbortReason::Cancel(Some(message.into())));
    }

    fn fire(&self, reason: AbortReason) {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(reason);
            true
        });
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortController")
            .field("aborted", &self.tx.borrow().is_some())
            .finish()
    }
}

/// Cloneable token observed by in-flight calls.
#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<Option<AbortReason>>,
}

impl AbortSignal {
    /// Whether the controller has fired.
    pub fn is_aborted(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The abort reason, if the controller has fired.
    pub fn reason(&self) -> Option<AbortReason> {
        self.rx.borrow().clone()
    }

    /// Resolves once the controller fires.
    ///
    /// Never resolves if the controller is dropped without aborting; callers
    /// race this against the work being cancelled.
    pub async fn aborted(&self) -> AbortReason {
        let mut rx = self.rx.clone();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // Controller gone without firing; this signal can never
                // abort anymore.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
