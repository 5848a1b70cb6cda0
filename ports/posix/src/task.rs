//! Tasks as named std threads.

use std::cell::Cell;
use std::sync::Arc;
use std::thread;

use osal::{KernelError, KernelResult, RawHandle, TaskParams};

use crate::table::{next_handle, Table};

const TARGET: &str = "osal_posix::task";

/// Smallest stack handed to a host thread; embedded-sized requests would
/// overflow as soon as the thread formats a log line.
pub const MIN_HOST_STACK: usize = 64 * 1024;

thread_local! {
    static CURRENT: Cell<Option<RawHandle>> = const { Cell::new(None) };
}

/// What the kernel knows about a live task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    /// Stack size as requested, before rounding up for the host.
    pub stack_size: usize,
    /// Recorded only; host threads all run at the same priority.
    pub priority: u8,
}

/// Removes the task record when the thread ends, however it ends.
struct Exit {
    table: Arc<Table<TaskInfo>>,
    handle: RawHandle,
}

impl Drop for Exit {
    fn drop(&mut self) {
        // A failed spawn drops the guard on the creating thread, whose own
        // identity must survive.
        if CURRENT.with(Cell::get) != Some(self.handle) {
            let _ = self.table.remove(self.handle);
            return;
        }
        CURRENT.with(|current| current.set(None));
        if let Ok(record) = self.table.remove(self.handle) {
            if thread::panicking() {
                log::error!(target: TARGET, "task {} \"{}\" panicked", self.handle, record.name);
            } else {
                log::warn!(
                    target: TARGET,
                    "task {} \"{}\" returned without deleting itself",
                    self.handle,
                    record.name
                );
            }
        }
    }
}

pub(crate) struct Tasks {
    table: Arc<Table<TaskInfo>>,
}

impl Tasks {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(Table::new()),
        }
    }

    pub(crate) fn spawn(&self, params: TaskParams<'_>) -> KernelResult<RawHandle> {
        if params.stack_size == 0 {
            return Err(KernelError::Rejected("zero stack size"));
        }
        let handle = next_handle()?;
        let name: String = params.name.chars().filter(|&ch| ch != '\0').collect();
        self.table.insert_at(
            handle,
            TaskInfo {
                name: name.clone(),
                stack_size: params.stack_size,
                priority: params.priority,
            },
        );

        let entry = params.entry;
        let exit = Exit {
            table: Arc::clone(&self.table),
            handle,
        };
        let spawned = thread::Builder::new()
            .name(name)
            .stack_size(params.stack_size.max(MIN_HOST_STACK))
            .spawn(move || {
                let _exit = exit;
                CURRENT.with(|current| current.set(Some(handle)));
                entry();
            });

        match spawned {
            Ok(_) => {
                log::trace!(
                    target: TARGET,
                    "task {handle} \"{}\" started at priority {}",
                    params.name,
                    params.priority
                );
                Ok(handle)
            }
            Err(err) => {
                log::error!(target: TARGET, "thread for task \"{}\" not spawned: {err}", params.name);
                Err(KernelError::NoMemory)
            }
        }
    }

    /// Forgets the calling task. The thread itself ends when its entry
    /// function returns.
    pub(crate) fn delete_current(&self) -> KernelResult<()> {
        let me = current().ok_or(KernelError::Rejected("caller is not a task"))?;
        let record = self.table.remove(me)?;
        log::trace!(target: TARGET, "task {me} \"{}\" deleted", record.name);
        Ok(())
    }

    pub(crate) fn exists(&self, task: RawHandle) -> bool {
        self.table.contains(task)
    }

    pub(crate) fn record(&self, task: RawHandle) -> KernelResult<Arc<TaskInfo>> {
        self.table.get(task)
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }
}

/// Handle of the task running on this thread, `None` for foreign threads.
pub(crate) fn current() -> Option<RawHandle> {
    CURRENT.with(Cell::get)
}
