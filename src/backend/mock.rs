//! Simulated terminal device for testing.
//!
//! Provides a [`SimulatedTty`] that stands in for the libc syscall layer of
//! [`PosixBackend`](super::PosixBackend). It supports queued reads, a write
//! log, one-shot syscall failures and per-syscall call counters, so tests can
//! check exactly how many times a descriptor was opened or closed.

use super::posix::raw_mode::cooked_attributes;
use super::posix::tty::Tty;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;

/// Syscalls recorded by [`SimulatedTty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syscall {
    Open,
    GetAttributes,
    SetAttributes,
    Read,
    Write,
    Drain,
    Close,
}

/// Inner state of the simulated device, protected by a mutex.
#[derive(Default)]
struct SimState {
    /// Paths that can be opened.
    devices: HashSet<String>,
    /// Currently open descriptors.
    open: HashSet<RawFd>,
    next_fd: RawFd,
    /// Chunks returned by successive reads.
    read_queue: VecDeque<Vec<u8>>,
    /// Whether an empty read queue blocks instead of returning 0.
    blocking_reads: bool,
    /// Whether open parks after being counted until released.
    hold_opens: bool,
    /// Every buffer accepted by write.
    write_log: Vec<Vec<u8>>,
    /// Maximum bytes a single write accepts.
    write_capacity: Option<usize>,
    /// Attributes last passed to set_attributes.
    applied: Option<libc::termios>,
    /// One-shot failures, as raw OS error codes.
    failures: HashMap<Syscall, i32>,
    calls: HashMap<Syscall, usize>,
}

impl SimState {
    /// Count the call and return any injected failure.
    fn enter(&mut self, syscall: Syscall) -> io::Result<()> {
        *self.calls.entry(syscall).or_default() += 1;
        match self.failures.remove(&syscall) {
            Some(code) => Err(io::Error::from_raw_os_error(code)),
            None => Ok(()),
        }
    }

    fn check_fd(&self, fd: RawFd) -> io::Result<()> {
        if self.open.contains(&fd) {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(libc::EBADF))
        }
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<SimState>,
    readable: Condvar,
}

/// Simulated terminal device.
///
/// Clones share state, so a test keeps one clone for inspection and hands
/// another to the backend.
///
/// # Example
/// ```
/// use serial_device::backend::{Backend, PosixBackend, SimulatedTty};
///
/// let tty = SimulatedTty::new().with_device("/dev/fake0");
/// let backend = PosixBackend::with_tty(tty.clone());
/// backend.connect("/dev/fake0", 9600).unwrap();
///
/// tty.enqueue_read(b"hi");
/// let mut seen = Vec::new();
/// assert!(backend.read(&mut |bytes: &[u8]| seen.extend_from_slice(bytes)).unwrap());
/// assert_eq!(seen, b"hi");
///
/// backend.dispose();
/// assert_eq!(tty.close_count(), 1);
/// ```
#[derive(Clone)]
pub struct SimulatedTty {
    shared: Arc<Shared>,
}

impl SimulatedTty {
    /// Create a simulated device with no openable paths.
    pub fn new() -> Self {
        let state = SimState {
            // 0-2 belong to stdio on a real system.
            next_fd: 3,
            ..SimState::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                readable: Condvar::new(),
            }),
        }
    }

    /// Make `path` openable.
    pub fn with_device(self, path: impl Into<String>) -> Self {
        self.shared.state.lock().devices.insert(path.into());
        self
    }

    /// Queue one chunk to be returned by a later read.
    ///
    /// A chunk longer than the read buffer is split across reads.
    pub fn enqueue_read(&self, data: &[u8]) {
        let mut state = self.shared.state.lock();
        state.read_queue.push_back(data.to_vec());
        self.shared.readable.notify_all();
    }

    /// Block reads on an empty queue until data is enqueued, like a terminal
    /// with `VMIN = 1`.
    pub fn set_blocking_reads(&self, blocking: bool) {
        self.shared.state.lock().blocking_reads = blocking;
        self.shared.readable.notify_all();
    }

    /// Park every open (after it is counted) until called again with `false`.
    ///
    /// Lets a test line up operations that race against a connect in flight.
    pub fn set_hold_opens(&self, hold: bool) {
        self.shared.state.lock().hold_opens = hold;
        self.shared.readable.notify_all();
    }

    /// Limit how many bytes a single write accepts.
    pub fn set_write_capacity(&self, capacity: Option<usize>) {
        self.shared.state.lock().write_capacity = capacity;
    }

    /// Fail the next call of `syscall` with the given OS error code.
    pub fn fail_next(&self, syscall: Syscall, errno: i32) {
        self.shared.state.lock().failures.insert(syscall, errno);
    }

    /// Number of times `syscall` was invoked.
    pub fn calls(&self, syscall: Syscall) -> usize {
        self.shared
            .state
            .lock()
            .calls
            .get(&syscall)
            .copied()
            .unwrap_or(0)
    }

    /// Number of close calls issued.
    pub fn close_count(&self) -> usize {
        self.calls(Syscall::Close)
    }

    /// Number of descriptors currently open.
    pub fn open_descriptors(&self) -> usize {
        self.shared.state.lock().open.len()
    }

    /// Copy of every buffer accepted by write, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().write_log.clone()
    }

    /// Attributes last applied through `set_attributes`.
    pub fn applied_attributes(&self) -> Option<libc::termios> {
        self.shared.state.lock().applied
    }

    /// Bytes still queued for reading.
    pub fn pending_read_bytes(&self) -> usize {
        self.shared
            .state
            .lock()
            .read_queue
            .iter()
            .map(Vec::len)
            .sum()
    }
}

impl Default for SimulatedTty {
    fn default() -> Self {
        Self::new()
    }
}

impl Tty for SimulatedTty {
    fn open(&self, path: &str) -> io::Result<RawFd> {
        let mut state = self.shared.state.lock();
        state.enter(Syscall::Open)?;
        while state.hold_opens {
            self.shared.readable.wait(&mut state);
        }
        if !state.devices.contains(path) {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        let fd = state.next_fd;
        state.next_fd += 1;
        state.open.insert(fd);
        Ok(fd)
    }

    fn get_attributes(&self, fd: RawFd) -> io::Result<libc::termios> {
        let mut state = self.shared.state.lock();
        state.enter(Syscall::GetAttributes)?;
        state.check_fd(fd)?;
        Ok(state.applied.unwrap_or_else(cooked_attributes))
    }

    fn set_attributes(&self, fd: RawFd, attributes: &libc::termios) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        state.enter(Syscall::SetAttributes)?;
        state.check_fd(fd)?;
        state.applied = Some(*attributes);
        Ok(())
    }

    fn read(&self, fd: RawFd, buffer: &mut [u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        state.enter(Syscall::Read)?;
        loop {
            state.check_fd(fd)?;
            if let Some(mut chunk) = state.read_queue.pop_front() {
                let count = chunk.len().min(buffer.len());
                buffer[..count].copy_from_slice(&chunk[..count]);
                if count < chunk.len() {
                    state.read_queue.push_front(chunk.split_off(count));
                }
                return Ok(count);
            }
            if !state.blocking_reads {
                return Ok(0);
            }
            self.shared.readable.wait(&mut state);
        }
    }

    fn write(&self, fd: RawFd, data: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        state.enter(Syscall::Write)?;
        state.check_fd(fd)?;
        let count = state.write_capacity.map_or(data.len(), |cap| cap.min(data.len()));
        if count > 0 {
            state.write_log.push(data[..count].to_vec());
        }
        Ok(count)
    }

    fn drain(&self, fd: RawFd) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        state.enter(Syscall::Drain)?;
        state.check_fd(fd)
    }

    fn close(&self, fd: RawFd) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        state.enter(Syscall::Close)?;
        if state.open.remove(&fd) {
            self.shared.readable.notify_all();
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(libc::EBADF))
        }
    }
}

impl std::fmt::Debug for SimulatedTty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SimulatedTty")
            .field("devices", &state.devices)
            .field("open", &state.open)
            .field("pending_reads", &state.read_queue.len())
            .finish()
    }
}
