use super::{CommandResult, ScriptCommand};
use crate::scripting::{CommandSource, ScriptRegistry};

/// `/script list`: every registered script and whether it is running
pub struct ListScriptsCommand;

impl ScriptCommand for ListScriptsCommand {
    fn name(&self) -> &'static str {
        "list"
    }

    fn usage(&self) -> &'static str {
        "list"
    }

    fn description(&self) -> &'static str {
        "Lists all scripts."
    }

    fn execute(&self, registry: &ScriptRegistry, source: &dyn CommandSource, _args: &[&str]) -> CommandResult {
        let names = registry.script_names();
        if names.is_empty() {
            source.send_message("There are no scripts.");
            return CommandResult::Success;
        }

        source.send_message(&format!("Scripts ({}):", names.len()));
        for name in names {
            // A script may be discarded between listing names and looking it up
            if let Some(script) = registry.get_script(&name) {
                source.send_message(&format!(" - {} [{}]", name, script.run_state()));
            }
        }
        CommandResult::Success
    }
}
