use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::{HostError, TaskCallback, TaskHandle, TaskScheduler, TaskSpec, TaskTiming};

/// Type of timer
#[derive(Debug, Clone)]
enum TimerType {
    /// One-shot timer that fires once and is removed
    OneShot { fire_at: Instant },
    /// Recurring timer that fires repeatedly at an interval
    Recurring {
        interval: Duration,
        next_fire: Instant,
    },
}

struct Timer {
    name: String,
    timer_type: TimerType,
    callback: TaskCallback,
}

struct TimerState {
    timers: HashMap<TaskHandle, Timer>,
    next_id: u64,
}

/// In-process scheduler driving script tasks off a periodic tick
pub struct TimerManager {
    state: Mutex<TimerState>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TimerState {
                timers: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Fire every due timer and return the handles and names that fired
    ///
    /// Callbacks run after the timer lock is released; one-shot timers are gone
    /// before their callback runs, so cancelling them from inside is a no-op.
    pub fn tick(&self, now: Instant) -> Vec<(TaskHandle, String)> {
        let mut due: Vec<(TaskHandle, String, TaskCallback)> = Vec::new();

        {
            let mut state = self.state.lock();
            let mut to_remove = Vec::new();

            for (handle, timer) in state.timers.iter_mut() {
                match &mut timer.timer_type {
                    TimerType::OneShot { fire_at } => {
                        if now >= *fire_at {
                            due.push((*handle, timer.name.clone(), timer.callback.clone()));
                            to_remove.push(*handle);
                        }
                    }
                    TimerType::Recurring {
                        interval,
                        next_fire,
                    } => {
                        if now >= *next_fire {
                            due.push((*handle, timer.name.clone(), timer.callback.clone()));
                            *next_fire = now + *interval;
                        }
                    }
                }
            }

            for handle in to_remove {
                state.timers.remove(&handle);
            }
        }

        due.sort_by_key(|(handle, _, _)| *handle);

        for (handle, name, callback) in &due {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback())) {
                error!(target: "scripting", "Task {} ({}) panicked: {:?}", handle, name, e);
            }
        }

        due.into_iter().map(|(handle, name, _)| (handle, name)).collect()
    }

    /// Get the number of active timers
    pub fn active_count(&self) -> usize {
        self.state.lock().timers.len()
    }
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler for TimerManager {
    fn schedule(&self, spec: TaskSpec) -> Result<TaskHandle, HostError> {
        let now = Instant::now();
        let timer_type = match spec.timing {
            TaskTiming::Delayed(delay) => TimerType::OneShot {
                fire_at: now + delay,
            },
            TaskTiming::Repeating(interval) => {
                if interval.is_zero() {
                    return Err(HostError::Unavailable(format!(
                        "task '{}' has a zero repeat interval",
                        spec.name
                    )));
                }
                TimerType::Recurring {
                    interval,
                    next_fire: now + interval,
                }
            }
        };

        let mut state = self.state.lock();
        let handle = TaskHandle(state.next_id);
        state.next_id += 1;

        debug!(target: "scripting", "Scheduling {} ({}) as {:?}", handle, spec.name, spec.timing);
        state.timers.insert(
            handle,
            Timer {
                name: spec.name,
                timer_type,
                callback: spec.callback,
            },
        );
        Ok(handle)
    }

    fn cancel(&self, handle: TaskHandle) -> Result<(), HostError> {
        match self.state.lock().timers.remove(&handle) {
            Some(timer) => {
                debug!(target: "scripting", "Cancelled {} ({})", handle, timer.name);
                Ok(())
            }
            None => Err(HostError::UnknownHandle(handle.0)),
        }
    }

    fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.state.lock().timers.contains_key(&handle)
    }
}
