//! Task manager.

use alloc::boxed::Box;

use crate::error::{OsError, OsResult};
use crate::kernel::{Kernel, TaskHandle, TaskParams};
use crate::os::Os;
use crate::trace::Primitive;

impl<K: Kernel> Os<K> {
    /// Creates a task running `entry`.
    ///
    /// Fails with [`OsError::InvalidParameter`] if `priority` is outside the
    /// configured range and with [`OsError::Platform`] if the kernel cannot
    /// create the task. A task must finish by calling
    /// [`Os::task_delete`]`(None)` and returning.
    pub fn task_create<F>(
        &self,
        entry: F,
        name: &str,
        stack_size: usize,
        priority: u8,
    ) -> OsResult<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.config().priority_in_range(priority) {
            return Err(OsError::InvalidParameter);
        }

        let raw = self
            .kernel()
            .task_create(TaskParams {
                entry: Box::new(entry),
                name,
                stack_size,
                priority,
            })
            .map_err(|_| OsError::Platform)?;

        self.account_create(
            Primitive::Task,
            raw,
            format_args!("\"{name}\", stack {stack_size} bytes, priority {priority}"),
        );
        Ok(TaskHandle::from_raw(raw))
    }

    /// Deletes the calling task; only `None` ("myself") is accepted, and only
    /// from inside a task.
    ///
    /// On kernels that cannot stop a thread from the outside control comes
    /// back here, and the task must return from its entry function at once.
    pub fn task_delete(&self, task: Option<TaskHandle>) -> OsResult<()> {
        if task.is_some() {
            return Err(OsError::InvalidParameter);
        }

        let me = self
            .kernel()
            .current_task()
            .ok_or(OsError::InvalidParameter)?;
        self.account_delete(Primitive::Task, Some(me));
        self.kernel()
            .task_delete_self()
            .map_err(|err| err.to_os(OsError::Platform))
    }

    /// True if `task` is the caller; `None` matches a caller that is not a
    /// kernel task.
    pub fn is_current_task(&self, task: Option<TaskHandle>) -> bool {
        self.kernel().current_task() == task.map(TaskHandle::raw)
    }

    /// Handle of the calling task.
    pub fn task_current(&self) -> OsResult<TaskHandle> {
        self.kernel()
            .current_task()
            .map(TaskHandle::from_raw)
            .ok_or(OsError::InvalidParameter)
    }

    /// Blocks the caller for at least `delay_ms`, rounded up to whole ticks.
    pub fn task_block(&self, delay_ms: u32) {
        let period = self.tick_period_ms().max(1);
        self.kernel().delay(delay_ms.div_ceil(period));
    }

    /// Minimum free stack, in bytes, the task has ever had; `None` asks about
    /// the caller.
    pub fn task_stack_min_free(&self, task: Option<TaskHandle>) -> OsResult<usize> {
        let raw = match task {
            Some(task) => task.raw(),
            None => self
                .kernel()
                .current_task()
                .ok_or(OsError::InvalidParameter)?,
        };
        self.kernel()
            .stack_high_water_mark(raw)
            .map_err(|err| err.to_os(OsError::Platform))
    }
}
