#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use osal::{Os, OsConfig, ResourceCounter};
use osal_posix::PosixKernel;

/// An `Os` with a counter of its own, so tests running in parallel do not
/// see each other's primitives.
pub fn os_with(config: OsConfig) -> Os<PosixKernel> {
    let counter: &'static ResourceCounter = Box::leak(Box::new(ResourceCounter::new()));
    Os::builder(PosixKernel::new())
        .config(config)
        .resource_counter(counter)
        .build()
}

pub fn os() -> Os<PosixKernel> {
    os_with(OsConfig::default())
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub const STACK: usize = 2048;
pub const PRIORITY: u8 = 5;
