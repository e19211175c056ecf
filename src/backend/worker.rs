//! Offloading blocking syscalls to the shared blocking pool.

use super::error::BackendError;
use crate::cancel::CancelToken;

/// Run `operation` on tokio's blocking pool and await it, unless `token` is
/// cancelled first.
///
/// On cancellation the await resolves to [`BackendError::Cancelled`] while the
/// worker keeps running; whatever it returns is dropped when it finishes. A
/// token that is already cancelled short-circuits before any work is spawned.
///
/// Cancellation is checked first, so when the worker completes at the same
/// moment the token fires, the call still reports `Cancelled` and the result
/// (for a read, the bytes it consumed) is discarded.
pub(crate) async fn run_blocking<F, R>(token: &CancelToken, operation: F) -> Result<R, BackendError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if token.is_cancelled() {
        return Err(BackendError::Cancelled);
    }

    let worker = tokio::task::spawn_blocking(operation);

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(BackendError::Cancelled),
        joined = worker => joined.map_err(|e| BackendError::Worker(e.to_string())),
    }
}
