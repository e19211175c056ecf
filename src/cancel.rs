//! Cancellation context passed to every async operation.
//!
//! A [`CancelToken`] is always present: callers that do not need cancellation
//! pass [`CancelToken::never`]. Cancelling a token resolves the awaiting side of
//! an operation as cancelled. It does not interrupt a blocking syscall that is
//! already running on a worker thread; that worker runs to completion on its
//! own.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation flag shared between a caller and its operations.
///
/// # Example
/// ```
/// use serial_device::CancelToken;
///
/// let token = CancelToken::new();
/// let child = token.clone();
/// assert!(!child.is_cancelled());
///
/// token.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a token that is not yet cancelled.
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// A token for callers that never cancel.
    pub fn never() -> Self {
        Self::new()
    }

    /// Cancel the token. Every clone observes the cancellation.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
