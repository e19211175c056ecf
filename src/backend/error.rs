//! Backend-specific error types.
//!
//! Defines the errors a transport backend reports, separate from the
//! facade-level [`DeviceError`](crate::DeviceError) so the backend contract
//! stays independent of backend selection.

use thiserror::Error;

/// Errors that can occur during backend operations.
///
/// Ordinary I/O failures on an open transport are not represented here: the
/// backend reports them as `Ok(false)` from `read`, `write` and `flush`. The
/// variants below are the cases a caller must handle differently.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend was disposed; no further operation is possible.
    #[error("Backend has been disposed")]
    Disposed,

    /// The awaiting side of an async operation was cancelled.
    #[error("Operation was cancelled")]
    Cancelled,

    /// The connection identifier could not be opened.
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the current terminal attributes failed.
    #[error("Failed to read terminal attributes: {0}")]
    GetAttributes(#[source] std::io::Error),

    /// Applying the raw-mode terminal attributes failed.
    #[error("Failed to apply terminal attributes: {0}")]
    SetAttributes(#[source] std::io::Error),

    /// The requested baud rate has no terminal speed on this platform.
    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    /// The blocking worker running a syscall panicked or was aborted.
    #[error("Blocking worker failed: {0}")]
    Worker(String),
}

impl BackendError {
    /// Create an Open error for the given path.
    pub fn open(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Whether this error signals use after dispose.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Whether this error signals an aborted await.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error is a connection failure (open or raw-mode setup).
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Open { .. }
                | Self::GetAttributes(_)
                | Self::SetAttributes(_)
                | Self::UnsupportedBaudRate(_)
        )
    }
}
