//! The device handle applications hold.
//!
//! A [`Device`] owns exactly one backend chosen by a
//! [`BackendRegistry`](crate::backend::BackendRegistry) and forwards reads,
//! writes and flushes to it. Every successful read is delivered to the
//! data-received subscribers, in subscription order, before the read call
//! returns.
//!
//! # Example
//!
//! ```no_run
//! use serial_device::{CancelToken, Device};
//! use std::collections::HashMap;
//!
//! # async fn example() {
//! let identifiers = HashMap::from([("linux".to_string(), "/dev/ttyACM0".to_string())]);
//! let Some(device) = Device::connect_async(&identifiers, 9600, &CancelToken::never()).await else {
//!     return;
//! };
//!
//! device.subscribe(|bytes| println!("{}", String::from_utf8_lossy(bytes)));
//! let _ = device.read_async(&CancelToken::never()).await;
//! # }
//! ```

use crate::backend::{Backend, BackendRegistry, Resolution};
use crate::cancel::CancelToken;
use crate::error::{DeviceError, DeviceResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Callback invoked with the bytes of one successful read.
pub type DataCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Handle returned by [`Device::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    callback: DataCallback,
}

/// A connected serial device.
pub struct Device {
    backend: Box<dyn Backend>,
    platform: &'static str,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription: AtomicU64,
}

impl Device {
    /// Connect through the process-wide registry.
    ///
    /// `identifiers` maps platform tags to connection identifiers, e.g.
    /// `{"linux": "/dev/ttyACM0"}`. Returns `None` when no backend matches the
    /// running platform, the map lacks the resolved tag, or connecting fails.
    pub fn connect(identifiers: &HashMap<String, String>, baud_rate: u32) -> Option<Device> {
        Self::try_connect(BackendRegistry::global(), identifiers, baud_rate)
            .map_err(|e| warn!("Device connection failed: {}", e))
            .ok()
    }

    /// Async form of [`connect`](Device::connect).
    pub async fn connect_async(
        identifiers: &HashMap<String, String>,
        baud_rate: u32,
        token: &CancelToken,
    ) -> Option<Device> {
        Self::try_connect_async(BackendRegistry::global(), identifiers, baud_rate, token)
            .await
            .map_err(|e| warn!("Device connection failed: {}", e))
            .ok()
    }

    /// Connect through `registry`, reporting why a connection was refused.
    pub fn try_connect(
        registry: &BackendRegistry,
        identifiers: &HashMap<String, String>,
        baud_rate: u32,
    ) -> DeviceResult<Device> {
        let (resolution, identifier) = Self::resolve(registry, identifiers)?;
        let backend = resolution.instantiate();
        backend.connect(identifier, baud_rate)?;
        Ok(Self::ready(backend, resolution.platform(), identifier))
    }

    /// Async form of [`try_connect`](Device::try_connect).
    pub async fn try_connect_async(
        registry: &BackendRegistry,
        identifiers: &HashMap<String, String>,
        baud_rate: u32,
        token: &CancelToken,
    ) -> DeviceResult<Device> {
        let (resolution, identifier) = Self::resolve(registry, identifiers)?;
        let backend = resolution.instantiate();
        backend.connect_async(identifier, baud_rate, token).await?;
        Ok(Self::ready(backend, resolution.platform(), identifier))
    }

    /// Pick the backend and the caller's identifier for its platform, before
    /// anything is constructed.
    fn resolve<'a>(
        registry: &BackendRegistry,
        identifiers: &'a HashMap<String, String>,
    ) -> DeviceResult<(Resolution, &'a str)> {
        let resolution = registry.resolve().ok_or_else(|| DeviceError::NoBackend {
            host: registry.host().to_string(),
        })?;
        let identifier = identifiers
            .get(resolution.platform())
            .ok_or_else(|| DeviceError::MissingIdentifier {
                platform: resolution.platform().to_string(),
            })?;
        Ok((resolution, identifier.as_str()))
    }

    fn ready(backend: Box<dyn Backend>, platform: &'static str, identifier: &str) -> Device {
        info!("Device ready on {} ({})", identifier, platform);
        Device {
            backend,
            platform,
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// The platform tag the backend was selected for.
    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// Whether the backend still holds its transport handle.
    pub fn is_connected(&self) -> DeviceResult<bool> {
        Ok(self.backend.is_connected()?)
    }

    /// Register a data-received callback.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a callback. Returns whether it was registered.
    ///
    /// Safe to call from inside a callback: the delivery in progress still
    /// reaches every subscriber that was registered when it started.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        subscribers.len() != before
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn deliver(&self, bytes: &[u8]) {
        // Snapshot so callbacks can (un)subscribe without deadlocking.
        let callbacks: Vec<DataCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|subscriber| Arc::clone(&subscriber.callback))
            .collect();
        trace!("Delivering {} bytes to {} subscribers", bytes.len(), callbacks.len());
        for callback in callbacks {
            callback(bytes);
        }
    }

    /// Read once and notify subscribers. Returns whether any bytes arrived.
    pub fn read(&self) -> DeviceResult<bool> {
        Ok(self.backend.read(&mut |bytes: &[u8]| self.deliver(bytes))?)
    }

    /// Async form of [`read`](Device::read).
    pub async fn read_async(&self, token: &CancelToken) -> DeviceResult<bool> {
        Ok(self
            .backend
            .read_async(&mut |bytes: &[u8]| self.deliver(bytes), token)
            .await?)
    }

    /// Write `data`; `true` when the transport accepted at least one byte.
    pub fn write(&self, data: &[u8]) -> DeviceResult<bool> {
        Ok(self.backend.write(data)?)
    }

    /// Async form of [`write`](Device::write).
    pub async fn write_async(&self, data: &[u8], token: &CancelToken) -> DeviceResult<bool> {
        Ok(self.backend.write_async(data, token).await?)
    }

    /// Write the UTF-8 bytes of `text`.
    pub fn write_text(&self, text: &str) -> DeviceResult<bool> {
        self.write(text.as_bytes())
    }

    /// Async form of [`write_text`](Device::write_text).
    pub async fn write_text_async(&self, text: &str, token: &CancelToken) -> DeviceResult<bool> {
        self.write_async(text.as_bytes(), token).await
    }

    /// Wait until written data has reached the device.
    pub fn flush(&self) -> DeviceResult<bool> {
        Ok(self.backend.flush()?)
    }

    /// Async form of [`flush`](Device::flush).
    pub async fn flush_async(&self, token: &CancelToken) -> DeviceResult<bool> {
        Ok(self.backend.flush_async(token).await?)
    }

    /// Release the transport and drop all subscribers. Idempotent.
    pub fn dispose(&self) {
        self.backend.dispose();
        self.subscribers.lock().clear();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Only the transport needs releasing here; subscribers drop with self.
        self.backend.dispose();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("platform", &self.platform)
            .field("backend", &self.backend)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::backend::{BackendDescriptor, PosixBackend, SimulatedTty};
    use std::sync::atomic::AtomicUsize;

    const DEVICE: &str = "/dev/fake0";

    fn registry_for(tty: &SimulatedTty) -> BackendRegistry {
        let tty = tty.clone();
        BackendRegistry::new(vec![BackendDescriptor::new("linux", move || {
            Box::new(PosixBackend::with_tty(tty.clone())) as Box<dyn Backend>
        })])
        .with_host("linux")
    }

    fn identifiers() -> HashMap<String, String> {
        HashMap::from([("linux".to_string(), DEVICE.to_string())])
    }

    fn connected() -> (SimulatedTty, Device) {
        let tty = SimulatedTty::new().with_device(DEVICE);
        let device = Device::try_connect(&registry_for(&tty), &identifiers(), 9600).unwrap();
        (tty, device)
    }

    #[test]
    fn test_subscribers_receive_in_subscription_order() {
        let (tty, device) = connected();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            device.subscribe(move |_| order.lock().push(label));
        }

        tty.enqueue_read(b"x");
        assert!(device.read().unwrap());
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (tty, device) = connected();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = device.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tty.enqueue_read(b"a");
        device.read().unwrap();
        assert!(device.unsubscribe(id));
        assert!(!device.unsubscribe(id));

        tty.enqueue_read(b"b");
        device.read().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_during_delivery_keeps_others() {
        let (tty, device) = connected();
        let device = Arc::new(device);
        let later_hits = Arc::new(AtomicUsize::new(0));

        let own_id = Arc::new(Mutex::new(None));
        let weak = Arc::downgrade(&device);
        let slot = Arc::clone(&own_id);
        let id = device.subscribe(move |_| {
            if let (Some(device), Some(id)) = (weak.upgrade(), *slot.lock()) {
                device.unsubscribe(id);
            }
        });
        *own_id.lock() = Some(id);

        let counter = Arc::clone(&later_hits);
        device.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tty.enqueue_read(b"1");
        device.read().unwrap();
        assert_eq!(device.subscriber_count(), 1);
        assert_eq!(later_hits.load(Ordering::SeqCst), 1);

        tty.enqueue_read(b"2");
        device.read().unwrap();
        assert_eq!(later_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_read_notifies_nobody() {
        let (_tty, device) = connected();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        device.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!device.read().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispose_clears_subscribers_and_is_idempotent() {
        let (tty, device) = connected();
        device.subscribe(|_| {});
        device.dispose();
        device.dispose();

        assert_eq!(device.subscriber_count(), 0);
        assert!(device.is_connected().unwrap_err().is_disposed());
        drop(device);
        assert_eq!(tty.close_count(), 1);
    }

    #[test]
    fn test_write_text_sends_bytes() {
        let (tty, device) = connected();
        assert!(device.write_text("hello\n").unwrap());
        assert_eq!(tty.write_log(), vec![b"hello\n".to_vec()]);
    }

    #[test]
    fn test_platform_is_reported() {
        let (_tty, device) = connected();
        assert_eq!(device.platform(), "linux");
        assert!(format!("{device:?}").contains("linux"));
    }
}
