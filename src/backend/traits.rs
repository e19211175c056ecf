//! The capability contract every transport backend satisfies.
//!
//! The [`Device`](crate::Device) facade depends only on this trait, so a
//! backend for another operating environment plugs in by implementing it and
//! registering a factory with the [`BackendRegistry`](super::BackendRegistry).

use super::error::BackendError;
use crate::cancel::CancelToken;
use async_trait::async_trait;

/// Maximum number of bytes a single read delivers.
pub const READ_BUFFER_SIZE: usize = 256;

/// Callback receiving exactly the bytes of one successful read.
pub type DataSink<'a> = &'a mut (dyn FnMut(&[u8]) + Send);

/// Transport backend for one operating environment.
///
/// Every operation on a disposed backend fails with
/// [`BackendError::Disposed`]. Blocking forms run the syscall on the calling
/// thread; async forms run it on the blocking pool and stop waiting when the
/// token is cancelled, without interrupting the syscall itself.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Whether a transport handle is currently held.
    fn is_connected(&self) -> Result<bool, BackendError>;

    /// Open `identifier` and put it into raw mode at `baud_rate`.
    ///
    /// Succeeds without reconfiguring when already connected. On failure no
    /// handle is left open.
    fn connect(&self, identifier: &str, baud_rate: u32) -> Result<(), BackendError>;

    /// Async form of [`connect`](Backend::connect).
    async fn connect_async(
        &self,
        identifier: &str,
        baud_rate: u32,
        token: &CancelToken,
    ) -> Result<(), BackendError>;

    /// Perform one read of up to [`READ_BUFFER_SIZE`] bytes.
    ///
    /// `on_data` is invoked once with the bytes read, only if at least one
    /// byte arrived. Returns whether a read occurred.
    fn read(&self, on_data: DataSink<'_>) -> Result<bool, BackendError>;

    /// Async form of [`read`](Backend::read).
    async fn read_async(
        &self,
        on_data: DataSink<'_>,
        token: &CancelToken,
    ) -> Result<bool, BackendError>;

    /// Write `data` in one attempt.
    ///
    /// Returns `true` when the transport accepted more than zero bytes, which
    /// does not imply the whole buffer was written.
    fn write(&self, data: &[u8]) -> Result<bool, BackendError>;

    /// Async form of [`write`](Backend::write).
    async fn write_async(&self, data: &[u8], token: &CancelToken) -> Result<bool, BackendError>;

    /// Wait until buffered output reached the device. `false` when not connected.
    fn flush(&self) -> Result<bool, BackendError>;

    /// Async form of [`flush`](Backend::flush).
    async fn flush_async(&self, token: &CancelToken) -> Result<bool, BackendError>;

    /// Release the transport handle. Safe to call any number of times.
    fn dispose(&self);
}
