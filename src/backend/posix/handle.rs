//! Exclusively owned descriptor of an open serial device.

use super::raw_mode::RawMode;
use super::tty::Tty;
use crate::backend::error::BackendError;
use crate::backend::traits::READ_BUFFER_SIZE;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// An open descriptor that is closed exactly once.
///
/// [`close`](TransportHandle::close) is guarded by an atomic flag, and `Drop`
/// goes through the same guard, so an explicit close racing the final drop
/// still issues a single `close` syscall.
pub(crate) struct TransportHandle<T: Tty> {
    tty: Arc<T>,
    fd: RawFd,
    closed: AtomicBool,
}

impl<T: Tty> TransportHandle<T> {
    /// Take ownership of an already-open descriptor.
    pub(crate) fn new(tty: Arc<T>, fd: RawFd) -> Self {
        Self {
            tty,
            fd,
            closed: AtomicBool::new(false),
        }
    }

    /// Open `path` and configure it for raw transfer at `baud_rate`.
    ///
    /// Any failure after the open drops the handle, which closes the
    /// descriptor before the error is returned.
    pub(crate) fn open_raw(tty: &Arc<T>, path: &str, baud_rate: u32) -> Result<Self, BackendError> {
        let fd = tty.open(path).map_err(|e| BackendError::open(path, e))?;
        let handle = Self::new(Arc::clone(tty), fd);
        debug!("Opened {} as fd {}", path, fd);

        let mut attributes = tty.get_attributes(fd).map_err(BackendError::GetAttributes)?;
        RawMode::new(baud_rate)?.apply(&mut attributes)?;
        tty.set_attributes(fd, &attributes)
            .map_err(BackendError::SetAttributes)?;

        debug!("Raw mode applied to {} at {} baud", path, baud_rate);
        Ok(handle)
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(io::Error::from_raw_os_error(libc::EBADF))
        } else {
            Ok(())
        }
    }

    /// Read once into a fresh buffer, returning exactly the bytes read.
    pub(crate) fn read_chunk(&self) -> io::Result<Vec<u8>> {
        self.ensure_open()?;
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let count = self.tty.read(self.fd, &mut buffer)?;
        Ok(buffer[..count].to_vec())
    }

    pub(crate) fn write(&self, data: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        self.tty.write(self.fd, data)
    }

    pub(crate) fn drain(&self) -> io::Result<()> {
        self.ensure_open()?;
        self.tty.drain(self.fd)
    }

    /// Close the descriptor if no one has yet.
    pub(crate) fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        match self.tty.close(self.fd) {
            Ok(()) => debug!("Closed fd {}", self.fd),
            Err(e) => warn!("Closing fd {} failed: {}", self.fd, e),
        }
    }
}

impl<T: Tty> Drop for TransportHandle<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Tty> std::fmt::Debug for TransportHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("fd", &self.fd)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
