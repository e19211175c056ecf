//! Serial transport for POSIX operating systems.
//!
//! The backend opens a character device, switches it to raw mode and performs
//! reads and writes on the descriptor. State moves from unconnected to
//! connected on a successful connect, and to closed (terminal) on dispose.

mod handle;
pub mod raw_mode;
pub mod tty;

use self::handle::TransportHandle;
use self::tty::{LibcTty, Tty};
use super::error::BackendError;
use super::traits::{Backend, DataSink};
use super::worker::run_blocking;
use crate::cancel::CancelToken;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use raw_mode::{supported_baud_rates, RawMode};

/// Platform tags the POSIX backend is registered under.
pub const PLATFORMS: &[&str] = &["linux", "android", "macos", "freebsd", "netbsd", "openbsd"];

/// Raw-mode serial backend over a POSIX terminal device.
pub struct PosixBackend<T: Tty = LibcTty> {
    tty: Arc<T>,
    handle: Mutex<Option<Arc<TransportHandle<T>>>>,
    disposed: AtomicBool,
}

impl PosixBackend<LibcTty> {
    /// Create an unconnected backend issuing real syscalls.
    pub fn new() -> Self {
        Self::with_tty(LibcTty)
    }
}

impl Default for PosixBackend<LibcTty> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tty> PosixBackend<T> {
    /// Create an unconnected backend on top of a custom syscall layer.
    pub fn with_tty(tty: T) -> Self {
        Self {
            tty: Arc::new(tty),
            handle: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> Result<(), BackendError> {
        if self.disposed.load(Ordering::Acquire) {
            Err(BackendError::Disposed)
        } else {
            Ok(())
        }
    }

    /// The current handle, or `None` when unconnected.
    fn live_handle(&self) -> Result<Option<Arc<TransportHandle<T>>>, BackendError> {
        self.ensure_live()?;
        Ok(self.handle.lock().clone())
    }

    /// Store a freshly configured handle, unless the backend was disposed or
    /// connected concurrently in the meantime.
    fn install(&self, handle: TransportHandle<T>, identifier: &str) -> Result<(), BackendError> {
        let mut slot = self.handle.lock();
        if self.disposed.load(Ordering::Acquire) {
            drop(slot);
            drop(handle);
            return Err(BackendError::Disposed);
        }
        if slot.is_some() {
            debug!("Already connected; dropping duplicate handle for {}", identifier);
            return Ok(());
        }
        info!("Connected to {} (fd {})", identifier, handle.fd());
        *slot = Some(Arc::new(handle));
        Ok(())
    }

    fn finish_read(result: io::Result<Vec<u8>>, on_data: DataSink<'_>) -> bool {
        match result {
            Ok(bytes) if !bytes.is_empty() => {
                on_data(&bytes);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Serial read failed: {}", e);
                false
            }
        }
    }

    fn finish_write(result: io::Result<usize>, requested: usize) -> bool {
        match result {
            Ok(written) => {
                if written < requested {
                    debug!("Partial write: {} of {} bytes", written, requested);
                }
                written > 0
            }
            Err(e) => {
                warn!("Serial write failed: {}", e);
                false
            }
        }
    }

    fn finish_flush(result: io::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Serial flush failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl<T: Tty> Backend for PosixBackend<T> {
    fn is_connected(&self) -> Result<bool, BackendError> {
        Ok(self.live_handle()?.is_some())
    }

    fn connect(&self, identifier: &str, baud_rate: u32) -> Result<(), BackendError> {
        if self.live_handle()?.is_some() {
            return Ok(());
        }
        let handle = TransportHandle::open_raw(&self.tty, identifier, baud_rate)?;
        self.install(handle, identifier)
    }

    async fn connect_async(
        &self,
        identifier: &str,
        baud_rate: u32,
        token: &CancelToken,
    ) -> Result<(), BackendError> {
        if self.live_handle()?.is_some() {
            return Ok(());
        }
        let tty = Arc::clone(&self.tty);
        let path = identifier.to_owned();
        // An abandoned worker drops its handle, closing the descriptor.
        let handle =
            run_blocking(token, move || TransportHandle::open_raw(&tty, &path, baud_rate)).await??;
        self.install(handle, identifier)
    }

    fn read(&self, on_data: DataSink<'_>) -> Result<bool, BackendError> {
        let Some(handle) = self.live_handle()? else {
            return Ok(false);
        };
        Ok(Self::finish_read(handle.read_chunk(), on_data))
    }

    async fn read_async(
        &self,
        on_data: DataSink<'_>,
        token: &CancelToken,
    ) -> Result<bool, BackendError> {
        let Some(handle) = self.live_handle()? else {
            return Ok(false);
        };
        let result = run_blocking(token, move || handle.read_chunk()).await?;
        Ok(Self::finish_read(result, on_data))
    }

    fn write(&self, data: &[u8]) -> Result<bool, BackendError> {
        let Some(handle) = self.live_handle()? else {
            return Ok(false);
        };
        Ok(Self::finish_write(handle.write(data), data.len()))
    }

    async fn write_async(&self, data: &[u8], token: &CancelToken) -> Result<bool, BackendError> {
        let Some(handle) = self.live_handle()? else {
            return Ok(false);
        };
        let payload = data.to_vec();
        let result = run_blocking(token, move || handle.write(&payload)).await?;
        Ok(Self::finish_write(result, data.len()))
    }

    fn flush(&self) -> Result<bool, BackendError> {
        let Some(handle) = self.live_handle()? else {
            return Ok(false);
        };
        Ok(Self::finish_flush(handle.drain()))
    }

    async fn flush_async(&self, token: &CancelToken) -> Result<bool, BackendError> {
        let Some(handle) = self.live_handle()? else {
            return Ok(false);
        };
        let result = run_blocking(token, move || handle.drain()).await?;
        Ok(Self::finish_flush(result))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        match Arc::try_unwrap(handle) {
            Ok(handle) => handle.close(),
            Err(shared) => {
                // A cancelled worker still holds the descriptor; the last
                // reference to drop closes it.
                debug!("Close of fd {} deferred to in-flight worker", shared.fd());
            }
        }
    }
}

impl<T: Tty> Drop for PosixBackend<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Tty> std::fmt::Debug for PosixBackend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixBackend")
            .field("handle", &*self.handle.lock())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}
