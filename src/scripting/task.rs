use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::error::{ResourceKind, TeardownError};
use super::handles;
use crate::host::{HostError, TaskHandle, TaskScheduler, TaskSpec};

/// Scheduled tasks a script has handed to the host scheduler
pub struct TaskSet {
    scheduler: Arc<dyn TaskScheduler>,
    /// Handle -> task name
    handles: BTreeMap<TaskHandle, String>,
}

impl TaskSet {
    pub fn new(scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            scheduler,
            handles: BTreeMap::new(),
        }
    }

    pub fn schedule(&mut self, spec: TaskSpec) -> Result<TaskHandle, HostError> {
        self.prune_fired();
        let name = spec.name.clone();
        let handle = self.scheduler.schedule(spec)?;
        self.handles.insert(handle, name);
        Ok(handle)
    }

    /// Cancel a single task early
    ///
    /// Returns false if the task is not (or no longer) owned by this set.
    pub fn cancel(&mut self, handle: TaskHandle) -> Result<bool, HostError> {
        if !self.handles.contains_key(&handle) {
            return Ok(false);
        }

        match self.scheduler.cancel(handle) {
            Ok(()) | Err(HostError::UnknownHandle(_)) => {
                self.handles.remove(&handle);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Forget tasks the scheduler no longer holds, returning how many were dropped
    ///
    /// One-shot tasks leave the scheduler when they fire; without this the set
    /// would keep their handles until teardown.
    pub fn prune_fired(&mut self) -> usize {
        let scheduler = &self.scheduler;
        let before = self.handles.len();
        self.handles.retain(|handle, _| scheduler.is_scheduled(*handle));

        let pruned = before - self.handles.len();
        if pruned > 0 {
            debug!(target: "scripting", "Forgot {} finished task(s)", pruned);
        }
        pruned
    }

    /// Cancel every pending task, returning how many were cancelled
    pub fn unregister_all(&mut self) -> Result<usize, TeardownError> {
        self.prune_fired();
        let scheduler = self.scheduler.clone();
        handles::drain(
            &mut self.handles,
            ResourceKind::Task,
            TaskHandle::raw,
            |handle| scheduler.cancel(handle),
        )
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.handles.contains_key(&handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = (TaskHandle, &str)> + '_ {
        self.handles.iter().map(|(handle, name)| (*handle, name.as_str()))
    }
}
