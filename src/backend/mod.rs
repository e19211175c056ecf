//! Transport backends and runtime backend selection.
//!
//! Provides the [`Backend`] contract, the [`BackendRegistry`] that picks the
//! backend for the running platform, and the POSIX serial transport.

pub mod error;
pub mod registry;
pub mod traits;
mod worker;

#[cfg(unix)]
pub mod mock;
#[cfg(unix)]
pub mod posix;

pub use error::BackendError;
pub use registry::{
    builtin_descriptors, current_platform, BackendDescriptor, BackendFactory, BackendRegistry,
    Resolution, SelectedBackend,
};
pub use traits::{Backend, DataSink, READ_BUFFER_SIZE};

#[cfg(unix)]
pub use mock::{SimulatedTty, Syscall};
#[cfg(unix)]
pub use posix::{
    supported_baud_rates,
    tty::{LibcTty, Tty},
    PosixBackend, RawMode,
};
