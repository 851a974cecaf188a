//! Script subcommands as issued from chat or the console
//!
//! The host parses `/script <name> [args...]` and hands the words to the
//! dispatcher; each command talks to the registry and answers the sender.

mod discard;
mod info;
mod list;
mod select;

use std::collections::BTreeMap;

use tracing::debug;

use crate::scripting::{CommandSource, ScriptRegistry};

pub use discard::DiscardScriptCommand;
pub use info::InfoScriptCommand;
pub use list::ListScriptsCommand;
pub use select::SelectScriptCommand;

/// Whether a command did anything the host should count as success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    Empty,
}

/// One `/script` subcommand
pub trait ScriptCommand: Send + Sync {
    fn name(&self) -> &'static str;

    fn usage(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn permission(&self) -> String {
        format!("craftgames.script.{}", self.name())
    }

    fn execute(&self, registry: &ScriptRegistry, source: &dyn CommandSource, args: &[&str]) -> CommandResult;
}

pub(crate) fn notify_invalid_selector(source: &dyn CommandSource) {
    source.send_message("This command can only be used by a player or the console.");
}

pub(crate) fn notify_missing_selection(source: &dyn CommandSource) {
    source.send_message("You have not selected a script. Use /script select <name> first.");
}

/// Routes `/script` subcommands by name and enforces their permissions
pub struct CommandDispatcher {
    commands: BTreeMap<&'static str, Box<dyn ScriptCommand>>,
}

impl CommandDispatcher {
    /// Create a dispatcher with no commands
    pub fn empty() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// Create a dispatcher with all built-in commands
    pub fn new() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.register(Box::new(SelectScriptCommand));
        dispatcher.register(Box::new(DiscardScriptCommand));
        dispatcher.register(Box::new(ListScriptsCommand));
        dispatcher.register(Box::new(InfoScriptCommand));
        dispatcher
    }

    pub fn register(&mut self, command: Box<dyn ScriptCommand>) {
        debug!(target: "commands", "Registering command: {}", command.name());
        self.commands.insert(command.name(), command);
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }

    /// Run one command line such as `select lobby`
    pub fn dispatch(&self, registry: &ScriptRegistry, source: &dyn CommandSource, line: &str) -> CommandResult {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            self.send_help(source);
            return CommandResult::Empty;
        };
        let args: Vec<&str> = words.collect();

        let Some(command) = self.commands.get(name.to_ascii_lowercase().as_str()) else {
            if name.eq_ignore_ascii_case("help") {
                self.send_help(source);
                return CommandResult::Success;
            }
            source.send_message(&format!("Unknown subcommand '{}'. Try /script help.", name));
            return CommandResult::Empty;
        };

        if !source.has_permission(&command.permission()) {
            debug!(target: "commands", "{} lacks {}", source.name(), command.permission());
            source.send_message("You don't have permission to do that.");
            return CommandResult::Empty;
        }

        command.execute(registry, source, &args)
    }

    fn send_help(&self, source: &dyn CommandSource) {
        for command in self.commands.values() {
            source.send_message(&format!("/script {} - {}", command.usage(), command.description()));
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use crate::scripting::{CommandSource, SourceKind};

    /// Command source that records every message it is sent
    pub struct RecordingSource {
        pub kind: SourceKind,
        pub permitted: bool,
        pub messages: Mutex<Vec<String>>,
    }

    impl RecordingSource {
        pub fn console() -> Self {
            Self {
                kind: SourceKind::Console,
                permitted: true,
                messages: Mutex::new(Vec::new()),
            }
        }

        pub fn last_message(&self) -> Option<String> {
            self.messages.lock().last().cloned()
        }
    }

    impl CommandSource for RecordingSource {
        fn name(&self) -> &str {
            "recorder"
        }

        fn kind(&self) -> SourceKind {
            self.kind.clone()
        }

        fn send_message(&self, message: &str) {
            self.messages.lock().push(message.to_string());
        }

        fn has_permission(&self, _permission: &str) -> bool {
            self.permitted
        }
    }
}
