use super::{CommandResult, ScriptCommand, notify_invalid_selector};
use crate::scripting::{CommandSource, RegistryError, ScriptRegistry};

/// `/script select [name]`: choose the script later commands operate on
pub struct SelectScriptCommand;

impl ScriptCommand for SelectScriptCommand {
    fn name(&self) -> &'static str {
        "select"
    }

    fn usage(&self) -> &'static str {
        "select [name]"
    }

    fn description(&self) -> &'static str {
        "Selects a script, or shows the current selection."
    }

    fn execute(&self, registry: &ScriptRegistry, source: &dyn CommandSource, args: &[&str]) -> CommandResult {
        let Ok(selector) = registry.resolve_selector(source) else {
            notify_invalid_selector(source);
            return CommandResult::Empty;
        };

        let Some(name) = args.first() else {
            match registry.get_selection(&selector) {
                Some(script) => source.send_message(&format!("Selected script: {}", script.name())),
                None => source.send_message("No script is selected."),
            }
            return CommandResult::Success;
        };

        match registry.select(selector, name) {
            Ok(script) => {
                source.send_message(&format!("Selected script {}.", script.name()));
                CommandResult::Success
            }
            Err(RegistryError::UnknownScript(name)) => {
                source.send_message(&format!("There is no script named '{}'.", name));
                CommandResult::Empty
            }
            Err(e) => {
                source.send_message(&e.to_string());
                CommandResult::Empty
            }
        }
    }
}
