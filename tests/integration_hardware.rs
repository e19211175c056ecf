//! Tests requiring an actual serial device.
//!
//! These tests are ignored by default.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyACM0          # device path
//! export TEST_BAUD=115200                # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if the device has TX-RX loopback
//!
//! cargo test --features hardware-tests --test integration_hardware -- --ignored
//! ```

#![cfg(all(unix, feature = "hardware-tests"))]

use serial_device::backend::current_platform;
use serial_device::{CancelToken, Device};
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Test device configuration from environment.
struct TestPortConfig {
    port_name: String,
    baud_rate: u32,
    loopback_enabled: bool,
}

impl TestPortConfig {
    fn from_env() -> Option<Self> {
        let Ok(port_name) = env::var("TEST_PORT") else {
            println!("Skipping hardware test: TEST_PORT not set");
            return None;
        };
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600);
        let loopback_enabled = env::var("TEST_LOOPBACK").ok().as_deref() == Some("1");

        Some(Self {
            port_name,
            baud_rate,
            loopback_enabled,
        })
    }

    fn identifiers(&self) -> HashMap<String, String> {
        HashMap::from([(current_platform().to_string(), self.port_name.clone())])
    }
}

#[test]
#[ignore] // Run with --ignored flag
fn test_real_device_connect_dispose() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };

    let device = Device::connect(&config.identifiers(), config.baud_rate)
        .unwrap_or_else(|| panic!("failed to connect to {}", config.port_name));
    assert!(device.is_connected().unwrap());

    device.dispose();
    assert!(device.is_connected().unwrap_err().is_disposed());
}

#[test]
#[ignore]
fn test_real_device_write_flush() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };

    let device = Device::connect(&config.identifiers(), config.baud_rate).unwrap();
    assert!(device.write_text("\r\n").unwrap());
    assert!(device.flush().unwrap());
}

#[tokio::test]
#[ignore]
async fn test_real_device_loopback() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };
    if !config.loopback_enabled {
        println!("Skipping loopback test: TEST_LOOPBACK not set");
        return;
    }

    let token = CancelToken::new();
    let device = Device::connect_async(&config.identifiers(), config.baud_rate, &token)
        .await
        .unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    device.subscribe(move |bytes| sink.lock().unwrap().extend_from_slice(bytes));

    let payload = b"loopback-check";
    assert!(device.write_async(payload, &token).await.unwrap());
    assert!(device.flush_async(&token).await.unwrap());

    let watchdog = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        watchdog.cancel();
    });

    while received.lock().unwrap().len() < payload.len() {
        match device.read_async(&token).await {
            Ok(read) => assert!(read),
            Err(e) if e.is_cancelled() => {
                panic!("loopback timed out after {:?}", received.lock().unwrap())
            }
            Err(e) => panic!("read failed: {e}"),
        }
    }
    assert_eq!(&received.lock().unwrap()[..], payload);
}
