//! Shared test utilities for serial-device integration tests.
//!
//! Builds registries and devices on top of [`SimulatedTty`] so tests can
//! script device input and count the syscalls the transport issues.

#![allow(dead_code)]

use serial_device::backend::{Backend, BackendDescriptor, BackendRegistry, PosixBackend};
use serial_device::{Device, SimulatedTty};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Device path the simulated terminal accepts.
pub const DEVICE: &str = "/dev/ttyACM0";

/// Host tag the test registries resolve for.
pub const HOST: &str = "linux";

/// A simulated terminal that accepts [`DEVICE`].
pub fn simulated_tty() -> SimulatedTty {
    SimulatedTty::new().with_device(DEVICE)
}

/// Registry whose only backend runs on `tty`, matched against [`HOST`].
pub fn registry_for(tty: &SimulatedTty) -> BackendRegistry {
    let tty = tty.clone();
    BackendRegistry::new(vec![BackendDescriptor::new(HOST, move || {
        Box::new(PosixBackend::with_tty(tty.clone())) as Box<dyn Backend>
    })])
    .with_host(HOST)
}

/// Identifier map with one entry per `(platform, identifier)` pair.
pub fn identifiers(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(platform, identifier)| (platform.to_string(), identifier.to_string()))
        .collect()
}

/// A device connected at 9600 baud on a fresh simulated terminal.
pub fn connected_device() -> (SimulatedTty, Device) {
    let tty = simulated_tty();
    let device = Device::try_connect(&registry_for(&tty), &identifiers(&[(HOST, DEVICE)]), 9600)
        .expect("simulated device should connect");
    (tty, device)
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
