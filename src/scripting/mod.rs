//! Script lifecycle core
//!
//! Tracks which scripts exist, which selector has which script selected, and
//! tears a running script's listeners and tasks down exactly once on discard.

pub mod error;
mod handles;
pub mod listener;
pub mod registry;
pub mod scanner;
pub mod script;
pub mod selector;
pub mod task;

// Re-export commonly used types
pub use error::{DiscardError, HandleFailure, RegistryError, ResourceKind, ScriptError, TeardownError};
pub use listener::ListenerSet;
pub use registry::{DiscardOutcome, ScriptRegistry};
pub use scanner::{ScriptSource, register_dir, scan_dir};
pub use script::{DiscardReport, RunState, Script, ScriptId, ScriptScope};
pub use selector::{CommandSource, Selector, SourceKind};
pub use task::TaskSet;
