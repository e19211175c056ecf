use crate::backend::BackendError;
use thiserror::Error;

/// A specialized `Result` type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by the [`Device`](crate::Device) facade.
///
/// Selection failures (`NoBackend`, `MissingIdentifier`) and connection
/// failures (`Backend` wrapping an open or configuration error) only surface
/// from the `try_connect` family; `connect` turns them into `None`.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No compiled-in backend matches the running platform.
    #[error("No backend available for platform '{host}'")]
    NoBackend { host: String },

    /// The caller's identifier map has no entry for the resolved platform.
    #[error("No connection identifier supplied for platform '{platform}'")]
    MissingIdentifier { platform: String },

    /// The backend reported an error.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl DeviceError {
    /// Whether the device was used after being disposed.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_disposed())
    }

    /// Whether an async operation's await was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_cancelled())
    }

    /// Whether backend selection failed before any OS resource was touched.
    pub fn is_selection_failure(&self) -> bool {
        matches!(self, Self::NoBackend { .. } | Self::MissingIdentifier { .. })
    }
}
