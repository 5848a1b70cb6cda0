//! Diagnostic trace of primitive creation and deletion.
//!
//! Records go to the `log` facade under the `osal::resource` target at debug
//! level; with no logger installed they cost a level check and nothing else.

use core::fmt;

use crate::kernel::RawHandle;

pub(crate) const TARGET: &str = "osal::resource";

/// Kind of primitive tracked by the resource accountant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Task,
    Queue,
    Mutex,
    Semaphore,
    Timer,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Task => "task",
            Self::Queue => "queue",
            Self::Mutex => "mutex",
            Self::Semaphore => "semaphore",
            Self::Timer => "timer",
        };
        f.write_str(name)
    }
}

pub(crate) fn created(kind: Primitive, handle: RawHandle, count: i32, details: fmt::Arguments<'_>) {
    log::debug!(
        target: TARGET,
        "{kind} {handle} created ({details}), {count} resource(s) allocated"
    );
}

pub(crate) fn deleted(kind: Primitive, handle: Option<RawHandle>, count: i32) {
    match handle {
        Some(handle) => log::debug!(
            target: TARGET,
            "{kind} {handle} deleted, {count} resource(s) allocated"
        ),
        None => log::debug!(
            target: TARGET,
            "{kind} deleted, {count} resource(s) allocated"
        ),
    }
}
