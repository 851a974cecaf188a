use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::{DiscardError, RegistryError};
use super::script::{DiscardReport, Script, ScriptId};
use super::selector::{CommandSource, Selector, SourceKind};
use crate::config::ScriptingConfig;
use crate::host::HostServices;

/// Result of asking the registry to discard a selector's script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardOutcome {
    /// The script was torn down and is no longer registered
    Discarded(DiscardReport),
    /// The selector has nothing selected
    NoSelection,
    /// The selected script is not running; nothing was changed
    NotRunning { name: String },
}

struct RegistryState {
    scripts: HashMap<String, Arc<Script>>,
    selections: HashMap<Selector, Weak<Script>>,
}

impl RegistryState {
    /// A selection only counts while that exact instance is still registered
    fn live_selection(&self, selector: &Selector) -> Option<Arc<Script>> {
        let script = self.selections.get(selector)?.upgrade()?;
        match self.scripts.get(script.name()) {
            Some(registered) if Arc::ptr_eq(registered, &script) => Some(script),
            _ => None,
        }
    }
}

/// Directory of known scripts and of which selector has selected which one
///
/// Constructed once by the host and shared by reference. Lock order is always
/// script before registry: the registry never locks a script while holding its
/// own lock.
pub struct ScriptRegistry {
    host: HostServices,
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
    /// Whether the server console may select scripts
    console_selector: bool,
}

impl ScriptRegistry {
    /// Create an empty registry wiring new scripts to `host`
    pub fn new(host: HostServices) -> Self {
        Self {
            host,
            state: Mutex::new(RegistryState {
                scripts: HashMap::new(),
                selections: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
            console_selector: true,
        }
    }

    pub fn with_config(host: HostServices, config: &ScriptingConfig) -> Self {
        let mut registry = Self::new(host);
        registry.console_selector = config.console_selector;
        registry
    }

    /// Register a new, not yet running script under a unique name
    pub fn create_script(&self, name: impl Into<String>) -> Result<Arc<Script>, RegistryError> {
        let name = name.into();
        let mut state = self.state.lock();

        if state.scripts.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        let id = ScriptId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let script = Arc::new(Script::new(id, name.clone(), &self.host));
        debug!(target: "scripting", "Registering script: {} ({})", name, id);
        state.scripts.insert(name, script.clone());
        Ok(script)
    }

    pub fn get_script(&self, name: &str) -> Option<Arc<Script>> {
        self.state.lock().scripts.get(name).cloned()
    }

    /// Names of all registered scripts, sorted
    pub fn script_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().scripts.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn script_count(&self) -> usize {
        self.state.lock().scripts.len()
    }

    /// Work out which selector a command source acts as
    pub fn resolve_selector(&self, source: &dyn CommandSource) -> Result<Selector, RegistryError> {
        match source.kind() {
            SourceKind::Player { id } => Ok(Selector::Player(id)),
            SourceKind::Console if self.console_selector => Ok(Selector::Console),
            kind => {
                debug!(target: "scripting", "{} ({:?}) cannot select scripts", source.name(), kind);
                Err(RegistryError::NoSelectorContext)
            }
        }
    }

    /// Point `selector` at the registered script called `name`
    pub fn select(&self, selector: Selector, name: &str) -> Result<Arc<Script>, RegistryError> {
        let mut state = self.state.lock();
        let script = state
            .scripts
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownScript(name.to_string()))?;

        debug!(target: "scripting", "{} selected script {}", selector, name);
        state.selections.insert(selector, Arc::downgrade(&script));
        Ok(script)
    }

    /// Forget the selector's selection, returning whether it had a live one
    pub fn deselect(&self, selector: &Selector) -> bool {
        let mut state = self.state.lock();
        let live = state.live_selection(selector).is_some();
        state.selections.remove(selector);
        live
    }

    /// The script `selector` currently has selected, if it is still registered
    pub fn get_selection(&self, selector: &Selector) -> Option<Arc<Script>> {
        self.state.lock().live_selection(selector)
    }

    /// Drop selection entries pointing at scripts that are gone, returning how many
    pub fn prune_selections(&self) -> usize {
        let mut state = self.state.lock();
        let stale: Vec<Selector> = state
            .selections
            .keys()
            .filter(|selector| state.live_selection(selector).is_none())
            .copied()
            .collect();

        for selector in &stale {
            state.selections.remove(selector);
        }
        stale.len()
    }

    /// Remove this exact script instance from the registry
    ///
    /// Returns false when it was not registered (already removed, or the name now
    /// belongs to a different instance). Selections pointing at it stop resolving
    /// immediately.
    pub fn unregister_script(&self, script: &Arc<Script>) -> bool {
        let mut state = self.state.lock();
        match state.scripts.get(script.name()) {
            Some(registered) if Arc::ptr_eq(registered, script) => {
                state.scripts.remove(script.name());
                debug!(target: "scripting", "Unregistered script {} ({})", script.name(), script.id());
                true
            }
            _ => false,
        }
    }

    /// Discard a specific script: tear down its listeners and tasks, then unregister it
    pub fn discard_script(&self, script: &Arc<Script>) -> Result<DiscardOutcome, DiscardError> {
        match script.discard_with(|| {
            self.unregister_script(script);
        }) {
            Ok(Some(report)) => Ok(DiscardOutcome::Discarded(report)),
            Ok(None) => Ok(DiscardOutcome::NotRunning {
                name: script.name().to_string(),
            }),
            Err(source) => Err(DiscardError::Teardown {
                script: script.name().to_string(),
                source,
            }),
        }
    }

    /// Discard whatever `selector` has selected
    pub fn discard(&self, selector: &Selector) -> Result<DiscardOutcome, DiscardError> {
        let Some(script) = self.get_selection(selector) else {
            debug!(target: "scripting", "{} has no script selected", selector);
            return Ok(DiscardOutcome::NoSelection);
        };

        self.discard_script(&script)
    }

    /// Full discard protocol for a command source: resolve, look up, tear down
    pub fn discard_for(&self, source: &dyn CommandSource) -> Result<DiscardOutcome, DiscardError> {
        let selector = self
            .resolve_selector(source)
            .map_err(|_| DiscardError::NoSelectorContext)?;

        let outcome = self.discard(&selector);
        match &outcome {
            Ok(DiscardOutcome::Discarded(report)) => {
                info!(target: "scripting", "{} discarded script {}", source.name(), report.name)
            }
            Err(e) => warn!(target: "scripting", "{} could not discard: {}", source.name(), e),
            Ok(_) => {}
        }
        outcome
    }
}
