//! Host-side services scripts install resources into
//!
//! The game server owns event delivery and task scheduling. Scripts only ever see
//! these two traits; the in-process `EventBus` and `TimerManager` implement them for
//! the console binary and for tests.

pub mod event_bus;
pub mod timer;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub use event_bus::EventBus;
pub use timer::TimerManager;

/// Handle identifying one installed event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerHandle(pub(crate) u64);

impl ListenerHandle {
    /// Wrap an id issued by a host implementation
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Handle identifying one scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub(crate) u64);

impl TaskHandle {
    /// Wrap an id issued by a host implementation
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Events delivered by the game server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerJoin { player: Uuid, name: String },
    PlayerQuit { player: Uuid },
    PlayerChat { player: Uuid, message: String },
    BlockBreak { player: Uuid, block: String },
    BlockPlace { player: Uuid, block: String },
    EntityDeath { entity: String },
    /// Event raised by another script or plugin
    Custom { name: String, payload: String },
}

/// Filter a listener subscribes with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Subscribe to all events
    All,
    PlayerJoin,
    PlayerQuit,
    PlayerChat,
    BlockBreak,
    BlockPlace,
    EntityDeath,
    /// Custom events with the given name
    Custom(String),
}

impl EventKind {
    /// Check if this filter matches the given event
    pub fn matches(&self, event: &GameEvent) -> bool {
        match self {
            EventKind::All => true,
            EventKind::PlayerJoin => matches!(event, GameEvent::PlayerJoin { .. }),
            EventKind::PlayerQuit => matches!(event, GameEvent::PlayerQuit { .. }),
            EventKind::PlayerChat => matches!(event, GameEvent::PlayerChat { .. }),
            EventKind::BlockBreak => matches!(event, GameEvent::BlockBreak { .. }),
            EventKind::BlockPlace => matches!(event, GameEvent::BlockPlace { .. }),
            EventKind::EntityDeath => matches!(event, GameEvent::EntityDeath { .. }),
            EventKind::Custom(wanted) => {
                matches!(event, GameEvent::Custom { name, .. } if name == wanted)
            }
        }
    }
}

/// Callback invoked for every matching event
pub type EventHandler = Arc<dyn Fn(&GameEvent) + Send + Sync>;

/// Callback invoked each time a task fires
pub type TaskCallback = Arc<dyn Fn() + Send + Sync>;

/// When a scheduled task fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTiming {
    /// Fire once after the delay, then the task is gone
    Delayed(Duration),
    /// Fire every interval until cancelled
    Repeating(Duration),
}

/// Description of a unit of work handed to the scheduler
#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    pub timing: TaskTiming,
    pub callback: TaskCallback,
}

impl TaskSpec {
    pub fn delayed(name: impl Into<String>, delay: Duration, callback: TaskCallback) -> Self {
        Self {
            name: name.into(),
            timing: TaskTiming::Delayed(delay),
            callback,
        }
    }

    pub fn repeating(name: impl Into<String>, interval: Duration, callback: TaskCallback) -> Self {
        Self {
            name: name.into(),
            timing: TaskTiming::Repeating(interval),
            callback,
        }
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

/// Failures reported by the host event system or scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host has no record of the handle (never issued, or already removed)
    #[error("unknown handle {0}")]
    UnknownHandle(u64),
    /// The host refused to remove the handle
    #[error("handle {handle} rejected: {reason}")]
    Rejected { handle: u64, reason: String },
    /// The host could not service the request at all
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// Host event system as seen by scripts
pub trait EventHost: Send + Sync {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<ListenerHandle, HostError>;

    fn unsubscribe(&self, handle: ListenerHandle) -> Result<(), HostError>;
}

/// Host scheduler as seen by scripts
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, spec: TaskSpec) -> Result<TaskHandle, HostError>;

    fn cancel(&self, handle: TaskHandle) -> Result<(), HostError>;

    /// Whether the task is still pending; false once a one-shot task has fired
    fn is_scheduled(&self, handle: TaskHandle) -> bool;
}

/// The pair of host services every script is wired to
#[derive(Clone)]
pub struct HostServices {
    pub events: Arc<dyn EventHost>,
    pub scheduler: Arc<dyn TaskScheduler>,
}

impl HostServices {
    pub fn new(events: Arc<dyn EventHost>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self { events, scheduler }
    }

    /// Build services backed by a fresh in-process event bus and timer manager
    pub fn in_process() -> (Self, Arc<EventBus>, Arc<TimerManager>) {
        let bus = Arc::new(EventBus::new());
        let timers = Arc::new(TimerManager::new());
        let services = Self::new(bus.clone(), timers.clone());
        (services, bus, timers)
    }
}
