//! Syscall seam for the POSIX backend.
//!
//! [`Tty`] is the narrow set of terminal syscalls the backend issues, which
//! lets tests substitute a simulated device. [`LibcTty`] forwards to libc.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

/// Terminal syscalls used by [`PosixBackend`](super::PosixBackend).
#[cfg_attr(test, mockall::automock)]
pub trait Tty: Send + Sync + 'static {
    /// Open a character device for reading and writing.
    fn open(&self, path: &str) -> io::Result<RawFd>;

    /// `tcgetattr`
    fn get_attributes(&self, fd: RawFd) -> io::Result<libc::termios>;

    /// `tcsetattr(TCSANOW)`
    fn set_attributes(&self, fd: RawFd, attributes: &libc::termios) -> io::Result<()>;

    fn read(&self, fd: RawFd, buffer: &mut [u8]) -> io::Result<usize>;

    fn write(&self, fd: RawFd, data: &[u8]) -> io::Result<usize>;

    /// Block until all queued output has been transmitted (`tcdrain`).
    fn drain(&self, fd: RawFd) -> io::Result<()>;

    fn close(&self, fd: RawFd) -> io::Result<()>;
}

/// [`Tty`] implementation issuing the real libc calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcTty;

/// Convert a libc return value into an `io::Result`, retrying on `EINTR`.
fn cvt_r<T, F>(mut call: F) -> io::Result<T>
where
    T: Copy + PartialOrd + Default,
    F: FnMut() -> T,
{
    loop {
        let result = call();
        if result >= T::default() {
            return Ok(result);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

impl Tty for LibcTty {
    fn open(&self, path: &str) -> io::Result<RawFd> {
        let path = CString::new(path)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;
        let flags = libc::O_RDWR | libc::O_NOCTTY | libc::O_CLOEXEC;
        cvt_r(|| unsafe { libc::open(path.as_ptr(), flags) })
    }

    fn get_attributes(&self, fd: RawFd) -> io::Result<libc::termios> {
        let mut attributes = std::mem::MaybeUninit::<libc::termios>::uninit();
        cvt_r(|| unsafe { libc::tcgetattr(fd, attributes.as_mut_ptr()) })?;
        // SAFETY: tcgetattr succeeded and filled the struct.
        Ok(unsafe { attributes.assume_init() })
    }

    fn set_attributes(&self, fd: RawFd, attributes: &libc::termios) -> io::Result<()> {
        cvt_r(|| unsafe { libc::tcsetattr(fd, libc::TCSANOW, attributes) }).map(|_| ())
    }

    fn read(&self, fd: RawFd, buffer: &mut [u8]) -> io::Result<usize> {
        let count = cvt_r(|| unsafe {
            libc::read(fd, buffer.as_mut_ptr().cast::<libc::c_void>(), buffer.len())
        })?;
        Ok(count as usize)
    }

    fn write(&self, fd: RawFd, data: &[u8]) -> io::Result<usize> {
        let count =
            cvt_r(|| unsafe { libc::write(fd, data.as_ptr().cast::<libc::c_void>(), data.len()) })?;
        Ok(count as usize)
    }

    fn drain(&self, fd: RawFd) -> io::Result<()> {
        cvt_r(|| unsafe { libc::tcdrain(fd) }).map(|_| ())
    }

    fn close(&self, fd: RawFd) -> io::Result<()> {
        // close is not retried: after EINTR the descriptor state is unspecified.
        if unsafe { libc::close(fd) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let err = LibcTty.open("/dev/nonexistent_tty_12345").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_open_rejects_interior_nul() {
        let err = LibcTty.open("/dev/tty\0S0").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_get_attributes_on_regular_file_fails() {
        let file = tempfile::tempfile().unwrap();
        let fd = std::os::unix::io::AsRawFd::as_raw_fd(&file);
        let err = LibcTty.get_attributes(fd).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
    }
}
