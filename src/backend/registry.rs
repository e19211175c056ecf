//! Backend registry and selection.
//!
//! The registry holds one [`BackendDescriptor`] per compiled-in backend and
//! platform tag. Selection walks the descriptors in registration order, picks
//! the first whose tag matches the host platform and has a factory, and
//! caches that choice for the lifetime of the registry.

use super::traits::Backend;
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Constructor for a backend instance.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn Backend> + Send + Sync>;

/// A compiled-in backend advertised under one platform tag.
#[derive(Clone)]
pub struct BackendDescriptor {
    platform: &'static str,
    factory: Option<BackendFactory>,
}

impl BackendDescriptor {
    /// Register a backend constructible through `factory`.
    pub fn new<F>(platform: &'static str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Backend> + Send + Sync + 'static,
    {
        Self {
            platform,
            factory: Some(Arc::new(factory)),
        }
    }

    /// Advertise a platform tag without a usable constructor.
    ///
    /// Selection skips such descriptors and keeps scanning.
    pub fn declared(platform: &'static str) -> Self {
        Self {
            platform,
            factory: None,
        }
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    pub fn is_constructible(&self) -> bool {
        self.factory.is_some()
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("platform", &self.platform)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// A freshly constructed backend together with the tag it was selected for.
#[derive(Debug)]
pub struct SelectedBackend {
    pub platform: &'static str,
    pub backend: Box<dyn Backend>,
}

/// The resolved platform tag and the factory registered for it.
#[derive(Clone)]
pub struct Resolution {
    platform: &'static str,
    factory: BackendFactory,
}

impl Resolution {
    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// Construct a new backend instance.
    pub fn instantiate(&self) -> Box<dyn Backend> {
        (self.factory)()
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("platform", &self.platform)
            .finish()
    }
}

/// Platform tag of the running operating environment.
pub fn current_platform() -> &'static str {
    std::env::consts::OS
}

/// Descriptors for every backend compiled into this build.
pub fn builtin_descriptors() -> Vec<BackendDescriptor> {
    #[allow(unused_mut)]
    let mut descriptors = Vec::new();

    #[cfg(unix)]
    for platform in super::posix::PLATFORMS {
        descriptors.push(BackendDescriptor::new(*platform, || {
            Box::new(super::posix::PosixBackend::new()) as Box<dyn Backend>
        }));
    }

    descriptors
}

static GLOBAL: Lazy<BackendRegistry> = Lazy::new(BackendRegistry::builtin);

/// Selects the backend matching the host platform.
pub struct BackendRegistry {
    descriptors: Vec<BackendDescriptor>,
    host: String,
    selection: OnceCell<Option<Resolution>>,
    /// Number of descriptor scans performed.
    scans: AtomicUsize,
}

impl BackendRegistry {
    /// Create a registry over `descriptors` for the running platform.
    pub fn new(descriptors: Vec<BackendDescriptor>) -> Self {
        Self {
            descriptors,
            host: current_platform().to_string(),
            selection: OnceCell::new(),
            scans: AtomicUsize::new(0),
        }
    }

    /// Create a registry over the compiled-in backends.
    pub fn builtin() -> Self {
        Self::new(builtin_descriptors())
    }

    /// The process-wide registry over the compiled-in backends.
    pub fn global() -> &'static BackendRegistry {
        &GLOBAL
    }

    /// Match against `host` instead of the running platform.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self.selection = OnceCell::new();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn descriptors(&self) -> &[BackendDescriptor] {
        &self.descriptors
    }

    /// Resolve the backend for the host platform, scanning only on first use.
    pub fn resolve(&self) -> Option<Resolution> {
        self.selection
            .get_or_init(|| {
                let resolution = self.scan();
                match &resolution {
                    Some(found) => info!(
                        "Selected '{}' backend for host platform '{}'",
                        found.platform, self.host
                    ),
                    None => info!("No backend available for host platform '{}'", self.host),
                }
                resolution
            })
            .clone()
    }

    fn scan(&self) -> Option<Resolution> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        for descriptor in &self.descriptors {
            if !descriptor.platform.eq_ignore_ascii_case(&self.host) {
                continue;
            }
            let Some(factory) = &descriptor.factory else {
                debug!(
                    "Skipping '{}' backend: no usable constructor",
                    descriptor.platform
                );
                continue;
            };
            return Some(Resolution {
                platform: descriptor.platform,
                factory: Arc::clone(factory),
            });
        }
        None
    }

    /// Construct the backend for the host platform, if any matches.
    pub fn select_backend(&self) -> Option<SelectedBackend> {
        self.resolve().map(|resolution| SelectedBackend {
            platform: resolution.platform(),
            backend: resolution.instantiate(),
        })
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("descriptors", &self.descriptors)
            .field("host", &self.host)
            .field("selection", &self.selection.get())
            .finish()
    }
}
