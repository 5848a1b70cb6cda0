//! The [`Os`] facade: one kernel, one configuration, one resource counter.
//!
//! The managers are implemented as `impl` blocks on [`Os`] in their own
//! modules (`task`, `queue`, `semaphore`, `timer`); mutex calls go through
//! whichever [`crate::mutex::MutexApi`] implementation the build selected.

use core::fmt;

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};

use crate::config::OsConfig;
use crate::error::OsResult;
use crate::kernel::{Kernel, RawHandle, Wait};
use crate::mutex::{self, ActiveMutexes};
use crate::private::PrivateTimers;
use crate::resource::{ResourceCounter, RESOURCES};
use crate::timer::TimerBackend;
use crate::trace::{self, Primitive};

pub(crate) struct Inner<K: Kernel> {
    pub(crate) kernel: Arc<K>,
    pub(crate) config: OsConfig,
    pub(crate) resources: &'static ResourceCounter,
    pub(crate) mutexes: ActiveMutexes<K>,
    pub(crate) timers: Box<dyn TimerBackend<K>>,
}

/// Portable handle onto the kernel services.
///
/// Cloning is cheap and every clone shares the same kernel, configuration,
/// counter and timer back-end.
pub struct Os<K: Kernel> {
    pub(crate) inner: Arc<Inner<K>>,
}

impl<K: Kernel> Clone for Os<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Kernel> fmt::Debug for Os<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Os")
            .field("config", &self.inner.config)
            .field("resources", &self.inner.resources.current())
            .finish()
    }
}

/// Non-owning [`Os`]; does not keep the kernel alive.
pub(crate) struct WeakOs<K: Kernel> {
    inner: Weak<Inner<K>>,
}

impl<K: Kernel> WeakOs<K> {
    pub(crate) fn upgrade(&self) -> Option<Os<K>> {
        self.inner.upgrade().map(|inner| Os { inner })
    }
}

/// Builder for an [`Os`].
pub struct OsBuilder<K: Kernel> {
    kernel: Arc<K>,
    config: OsConfig,
    resources: &'static ResourceCounter,
    timers: Option<Box<dyn TimerBackend<K>>>,
}

impl<K: Kernel> OsBuilder<K> {
    pub fn config(mut self, config: OsConfig) -> Self {
        self.config = config;
        self
    }

    /// Accounts primitives in `counter` instead of the process-wide one.
    pub fn resource_counter(mut self, counter: &'static ResourceCounter) -> Self {
        self.resources = counter;
        self
    }

    /// Replaces the default [`PrivateTimers`] back-end.
    pub fn timer_backend(mut self, backend: impl TimerBackend<K> + 'static) -> Self {
        self.timers = Some(Box::new(backend));
        self
    }

    pub fn build(self) -> Os<K> {
        let mutexes = mutex::active_mutexes(Arc::clone(&self.kernel), self.resources);
        let timers = self
            .timers
            .unwrap_or_else(|| Box::new(PrivateTimers::<K>::new()));
        Os {
            inner: Arc::new(Inner {
                kernel: self.kernel,
                config: self.config,
                resources: self.resources,
                mutexes,
                timers,
            }),
        }
    }
}

impl<K: Kernel> Os<K> {
    /// Wraps `kernel` with the default configuration and counter.
    pub fn new(kernel: K) -> Self {
        Self::builder(kernel).build()
    }

    pub fn builder(kernel: K) -> OsBuilder<K> {
        Self::builder_shared(Arc::new(kernel))
    }

    /// Like [`Os::builder`] for a kernel that is already shared.
    pub fn builder_shared(kernel: Arc<K>) -> OsBuilder<K> {
        OsBuilder {
            kernel,
            config: OsConfig::default(),
            resources: &RESOURCES,
            timers: None,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.inner.kernel
    }

    pub fn config(&self) -> &OsConfig {
        &self.inner.config
    }

    /// Number of primitives created and not yet deleted.
    pub fn resource_alloc_count(&self) -> i32 {
        self.inner.resources.current()
    }

    /// Brings up the timer back-end. Calling it twice is harmless.
    pub fn init(&self) -> OsResult<()> {
        self.inner.timers.init(self)
    }

    /// Tears down the timer back-end. Calling it twice is harmless.
    pub fn deinit(&self) {
        self.inner.timers.deinit(self)
    }

    pub(crate) fn downgrade(&self) -> WeakOs<K> {
        WeakOs {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn tick_period_ms(&self) -> u32 {
        self.inner.kernel.tick_period_ms()
    }

    pub(crate) fn wait_ms(&self, ms: u32) -> Wait {
        Wait::from_ms(ms, self.tick_period_ms())
    }

    pub(crate) fn account_create(&self, kind: Primitive, handle: RawHandle, details: fmt::Arguments<'_>) {
        self.inner.resources.increment();
        trace::created(kind, handle, self.inner.resources.current(), details);
    }

    pub(crate) fn account_delete(&self, kind: Primitive, handle: Option<RawHandle>) {
        self.inner.resources.decrement();
        trace::deleted(kind, handle, self.inner.resources.current());
    }
}
