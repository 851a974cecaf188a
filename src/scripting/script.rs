use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::error::{ScriptError, TeardownError};
use super::listener::ListenerSet;
use super::task::TaskSet;
use crate::host::{EventHandler, EventKind, HostError, HostServices, ListenerHandle, TaskHandle, TaskSpec};

/// Registry-assigned identity of a script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptId(pub(crate) u64);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a script currently has side effects installed in the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RunState {
    #[strum(serialize = "not running")]
    NotRunning,
    #[strum(serialize = "running")]
    Running,
}

/// What a successful discard tore down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardReport {
    pub name: String,
    pub listeners: usize,
    pub tasks: usize,
}

struct ScriptState {
    run_state: RunState,
    /// Set once discard completes; a dead script never runs again
    discarded: bool,
    started_at: Option<DateTime<Utc>>,
    listeners: ListenerSet,
    tasks: TaskSet,
}

/// Access to a script's resources while it is being started
///
/// Only handed out under the script lock, so setup code must install resources
/// through the scope rather than through the `Script` itself.
pub struct ScriptScope<'a> {
    name: &'a str,
    state: &'a mut ScriptState,
}

impl ScriptScope<'_> {
    pub fn script_name(&self) -> &str {
        self.name
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> Result<ListenerHandle, HostError> {
        self.state.listeners.subscribe(kind, handler)
    }

    pub fn schedule(&mut self, spec: TaskSpec) -> Result<TaskHandle, HostError> {
        self.state.tasks.schedule(spec)
    }
}

/// A named script with the listeners and tasks it installed into the host
///
/// `NotRunning` always implies both resource sets are empty.
pub struct Script {
    id: ScriptId,
    name: String,
    state: Mutex<ScriptState>,
}

impl Script {
    pub(crate) fn new(id: ScriptId, name: impl Into<String>, host: &HostServices) -> Self {
        Self {
            id,
            name: name.into(),
            state: Mutex::new(ScriptState {
                run_state: RunState::NotRunning,
                discarded: false,
                started_at: None,
                listeners: ListenerSet::new(host.events.clone()),
                tasks: TaskSet::new(host.scheduler.clone()),
            }),
        }
    }

    pub fn id(&self) -> ScriptId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().run_state == RunState::Running
    }

    pub fn run_state(&self) -> RunState {
        self.state.lock().run_state
    }

    pub fn is_discarded(&self) -> bool {
        self.state.lock().discarded
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().started_at
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Number of tasks still pending in the scheduler
    pub fn task_count(&self) -> usize {
        let mut state = self.state.lock();
        state.tasks.prune_fired();
        state.tasks.len()
    }

    pub fn listener_handles(&self) -> Vec<ListenerHandle> {
        self.state.lock().listeners.handles().map(|(handle, _)| handle).collect()
    }

    pub fn task_handles(&self) -> Vec<TaskHandle> {
        let mut state = self.state.lock();
        state.tasks.prune_fired();
        state.tasks.handles().map(|(handle, _)| handle).collect()
    }

    /// Transition NotRunning -> Running, letting `setup` install listeners and tasks
    ///
    /// If setup fails, whatever it installed is torn down again and the script stays
    /// NotRunning. Should that rollback itself fail, the script is left Running so the
    /// leftover handles remain reachable by discard.
    pub fn start<F>(&self, setup: F) -> Result<(), ScriptError>
    where
        F: FnOnce(&mut ScriptScope<'_>) -> Result<(), ScriptError>,
    {
        let mut state = self.state.lock();

        if state.discarded {
            return Err(ScriptError::Discarded(self.name.clone()));
        }
        if state.run_state == RunState::Running {
            return Err(ScriptError::AlreadyRunning(self.name.clone()));
        }

        let result = {
            let mut scope = ScriptScope {
                name: &self.name,
                state: &mut *state,
            };
            setup(&mut scope)
        };

        match result {
            Ok(()) => {
                state.run_state = RunState::Running;
                state.started_at = Some(Utc::now());
                info!(
                    target: "scripting",
                    "Started script {} ({}) with {} listener(s) and {} task(s)",
                    self.name,
                    self.id,
                    state.listeners.len(),
                    state.tasks.len()
                );
                Ok(())
            }
            Err(e) => {
                warn!(target: "scripting", "Setup of script {} failed: {}", self.name, e);
                let listeners = state.listeners.unregister_all();
                let tasks = state.tasks.unregister_all();
                if let Some(rollback) = TeardownError::merge(listeners.err(), tasks.err()) {
                    error!(
                        target: "scripting",
                        "Could not roll back script {}; leaving it running for discard: {}",
                        self.name,
                        rollback
                    );
                    state.run_state = RunState::Running;
                    state.started_at = Some(Utc::now());
                }
                Err(e)
            }
        }
    }

    /// Install another listener while running
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<ListenerHandle, ScriptError> {
        let mut state = self.state.lock();
        self.ensure_running(&state)?;
        Ok(state.listeners.subscribe(kind, handler)?)
    }

    /// Schedule another task while running
    pub fn schedule(&self, spec: TaskSpec) -> Result<TaskHandle, ScriptError> {
        let mut state = self.state.lock();
        self.ensure_running(&state)?;
        Ok(state.tasks.schedule(spec)?)
    }

    /// Cancel one of this script's tasks before it is discarded
    pub fn cancel_task(&self, handle: TaskHandle) -> Result<bool, ScriptError> {
        let mut state = self.state.lock();
        self.ensure_running(&state)?;
        Ok(state.tasks.cancel(handle)?)
    }

    pub fn unregister_listeners(&self) -> Result<usize, TeardownError> {
        self.state.lock().listeners.unregister_all()
    }

    pub fn unregister_tasks(&self) -> Result<usize, TeardownError> {
        self.state.lock().tasks.unregister_all()
    }

    /// Tear the script down if it is running
    ///
    /// Runs entirely under the script lock: listeners first, then tasks, then
    /// `deregister`, then the flip to NotRunning. Returns `Ok(None)` when the script
    /// was not running. On failure nothing past teardown happens and the script stays
    /// Running, with only the handles that failed left in its sets.
    pub(crate) fn discard_with<F>(&self, deregister: F) -> Result<Option<DiscardReport>, TeardownError>
    where
        F: FnOnce(),
    {
        let mut state = self.state.lock();

        if state.run_state != RunState::Running {
            debug!(target: "scripting", "Script {} is not running, nothing to discard", self.name);
            return Ok(None);
        }

        let listeners = state.listeners.unregister_all();
        let tasks = state.tasks.unregister_all();

        if let Some(err) = TeardownError::merge(listeners.clone().err(), tasks.clone().err()) {
            error!(target: "scripting", "Discard of script {} incomplete: {}", self.name, err);
            return Err(err);
        }

        deregister();

        state.run_state = RunState::NotRunning;
        state.discarded = true;
        state.started_at = None;

        let report = DiscardReport {
            name: self.name.clone(),
            listeners: listeners.unwrap_or_default(),
            tasks: tasks.unwrap_or_default(),
        };
        info!(
            target: "scripting",
            "Discarded script {} ({}): {} listener(s), {} task(s)",
            self.name,
            self.id,
            report.listeners,
            report.tasks
        );
        Ok(Some(report))
    }

    fn ensure_running(&self, state: &ScriptState) -> Result<(), ScriptError> {
        if state.discarded {
            return Err(ScriptError::Discarded(self.name.clone()));
        }
        if state.run_state != RunState::Running {
            return Err(ScriptError::NotRunning(self.name.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Script");
        s.field("id", &self.id).field("name", &self.name);
        match self.state.try_lock() {
            Some(state) => s
                .field("run_state", &state.run_state)
                .field("discarded", &state.discarded)
                .field("listeners", &state.listeners.len())
                .field("tasks", &state.tasks.len()),
            None => s.field("state", &"<locked>"),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{EventBus, EventHost, GameEvent, TaskScheduler, TimerManager};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    /// Event host that refuses to unsubscribe while `stuck` is set
    struct StickyEvents {
        bus: EventBus,
        stuck: AtomicBool,
    }

    impl EventHost for StickyEvents {
        fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<ListenerHandle, HostError> {
            self.bus.subscribe(kind, handler)
        }

        fn unsubscribe(&self, handle: ListenerHandle) -> Result<(), HostError> {
            if self.stuck.load(Ordering::SeqCst) {
                return Err(HostError::Rejected {
                    handle: handle.raw(),
                    reason: "listener is busy".to_string(),
                });
            }
            self.bus.unsubscribe(handle)
        }
    }

    fn script(name: &str) -> (Script, Arc<EventBus>, Arc<TimerManager>) {
        let (host, bus, timers) = HostServices::in_process();
        (Script::new(ScriptId(1), name, &host), bus, timers)
    }

    #[test]
    fn test_start_installs_resources() {
        let (script, bus, timers) = script("arena");

        script
            .start(|scope| {
                scope.subscribe(EventKind::PlayerJoin, Arc::new(|_: &GameEvent| {}))?;
                scope.schedule(TaskSpec::repeating("tick", Duration::from_secs(1), Arc::new(|| {})))?;
                Ok(())
            })
            .unwrap();

        assert!(script.is_running());
        assert!(script.started_at().is_some());
        assert_eq!(script.listener_count(), 1);
        assert_eq!(script.task_count(), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(timers.active_count(), 1);
    }

    #[test]
    fn test_start_twice_fails() {
        let (script, _bus, _timers) = script("arena");
        script.start(|_| Ok(())).unwrap();

        assert_eq!(
            script.start(|_| Ok(())),
            Err(ScriptError::AlreadyRunning("arena".to_string()))
        );
    }

    #[test]
    fn test_failed_setup_rolls_back() {
        let (script, bus, timers) = script("arena");

        let result = script.start(|scope| {
            scope.subscribe(EventKind::All, Arc::new(|_: &GameEvent| {}))?;
            scope.schedule(TaskSpec::delayed("later", Duration::from_secs(3), Arc::new(|| {})))?;
            Err(ScriptError::Setup("missing map".to_string()))
        });

        assert_eq!(result, Err(ScriptError::Setup("missing map".to_string())));
        assert!(!script.is_running());
        assert_eq!(script.listener_count(), 0);
        assert_eq!(script.task_count(), 0);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(timers.active_count(), 0);
    }

    #[test]
    fn test_subscribe_requires_running() {
        let (script, bus, _timers) = script("arena");

        let result = script.subscribe(EventKind::PlayerChat, Arc::new(|_: &GameEvent| {}));
        assert_eq!(result, Err(ScriptError::NotRunning("arena".to_string())));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_discard_with_runs_deregister_once() {
        let (script, bus, timers) = script("arena");
        script
            .start(|scope| {
                scope.subscribe(EventKind::All, Arc::new(|_: &GameEvent| {}))?;
                Ok(())
            })
            .unwrap();

        let mut calls = 0;
        let report = script.discard_with(|| calls += 1).unwrap().unwrap();
        assert_eq!(report.listeners, 1);
        assert_eq!(report.tasks, 0);
        assert_eq!(calls, 1);

        assert!(script.discard_with(|| calls += 1).unwrap().is_none());
        assert_eq!(calls, 1);
        assert!(script.is_discarded());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(timers.active_count(), 0);
        assert_eq!(
            bus.dispatch(&GameEvent::EntityDeath {
                entity: "pig".to_string()
            }),
            0
        );
    }

    #[test]
    fn test_discarded_script_cannot_restart() {
        let (script, _bus, _timers) = script("arena");
        script.start(|_| Ok(())).unwrap();
        script.discard_with(|| {}).unwrap();

        assert_eq!(
            script.start(|_| Ok(())),
            Err(ScriptError::Discarded("arena".to_string()))
        );
    }

    #[test]
    fn test_cancel_task_while_running() {
        let (script, _bus, timers) = script("arena");
        let mut countdown = None;
        script
            .start(|scope| {
                countdown = Some(scope.schedule(TaskSpec::delayed("countdown", Duration::from_secs(30), Arc::new(|| {})))?);
                scope.schedule(TaskSpec::repeating("scoreboard", Duration::from_secs(1), Arc::new(|| {})))?;
                Ok(())
            })
            .unwrap();
        let countdown = countdown.unwrap();

        assert_eq!(script.cancel_task(countdown), Ok(true));
        assert_eq!(script.cancel_task(countdown), Ok(false));
        assert_eq!(script.task_count(), 1);
        assert!(!timers.is_scheduled(countdown));
    }

    #[test]
    fn test_fired_one_shot_leaves_task_count() {
        let (script, _bus, timers) = script("arena");
        script
            .start(|scope| {
                scope.schedule(TaskSpec::repeating("scoreboard", Duration::from_secs(60), Arc::new(|| {})))?;
                Ok(())
            })
            .unwrap();

        for _ in 0..100 {
            script
                .schedule(TaskSpec::delayed("spawn", Duration::from_millis(1), Arc::new(|| {})))
                .unwrap();
            timers.tick(Instant::now() + Duration::from_millis(10));
        }

        assert_eq!(script.task_count(), 1);
        assert_eq!(timers.active_count(), 1);

        let report = script.discard_with(|| {}).unwrap().unwrap();
        assert_eq!(report.tasks, 1);
        assert_eq!(timers.active_count(), 0);
    }

    #[test]
    fn test_failed_rollback_leaves_script_running() {
        let events = Arc::new(StickyEvents {
            bus: EventBus::new(),
            stuck: AtomicBool::new(true),
        });
        let timers = Arc::new(TimerManager::new());
        let script = Script::new(ScriptId(1), "arena", &HostServices::new(events.clone(), timers));

        let result = script.start(|scope| {
            scope.subscribe(EventKind::PlayerJoin, Arc::new(|_: &GameEvent| {}))?;
            Err(ScriptError::Setup("boom".to_string()))
        });

        assert_eq!(result, Err(ScriptError::Setup("boom".to_string())));
        assert!(script.is_running());
        assert_eq!(script.listener_count(), 1);

        // Once the host lets go, discard reaches the leftover listener
        events.stuck.store(false, Ordering::SeqCst);
        let report = script.discard_with(|| {}).unwrap().unwrap();
        assert_eq!(report.listeners, 1);
        assert!(!script.is_running());
        assert_eq!(events.bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unregister_sets_independently() {
        let (script, _bus, _timers) = script("arena");
        script
            .start(|scope| {
                scope.subscribe(EventKind::BlockBreak, Arc::new(|_: &GameEvent| {}))?;
                scope.schedule(TaskSpec::delayed("x", Duration::from_secs(1), Arc::new(|| {})))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(script.unregister_tasks(), Ok(1));
        assert_eq!(script.unregister_listeners(), Ok(1));
        assert_eq!(script.unregister_listeners(), Ok(0));
        assert_eq!(script.unregister_tasks(), Ok(0));
    }
}
