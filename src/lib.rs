//! Serial Device Library
//!
//! Cross-platform access to a serial device (e.g. a microcontroller on
//! `/dev/ttyACM0`): connect, read, write and flush raw bytes, with a
//! data-received notification for every successful read.
//!
//! # Modules
//!
//! - `backend`: the backend contract, the registry that selects the backend
//!   for the running platform, and the POSIX raw-mode transport
//! - `device`: the `Device` facade applications hold
//! - `cancel`: cancellation tokens for async operations
//! - `error`: facade-level error handling
//! - `config`: configuration management with TOML support

pub mod backend;
pub mod cancel;
pub mod config;
pub mod device;
pub mod error;

// Re-export commonly used types for convenience
pub use backend::{
    Backend, BackendDescriptor, BackendError, BackendRegistry, SelectedBackend, READ_BUFFER_SIZE,
};
pub use cancel::CancelToken;
pub use device::{DataCallback, Device, SubscriptionId};
pub use error::{DeviceError, DeviceResult};

#[cfg(unix)]
pub use backend::{PosixBackend, SimulatedTty};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
