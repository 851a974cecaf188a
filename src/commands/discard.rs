use tracing::warn;

use super::{CommandResult, ScriptCommand, notify_invalid_selector, notify_missing_selection};
use crate::scripting::{CommandSource, DiscardError, DiscardOutcome, ScriptRegistry};

/// `/script discard`: tear down the selected script with its tasks and listeners
pub struct DiscardScriptCommand;

impl ScriptCommand for DiscardScriptCommand {
    fn name(&self) -> &'static str {
        "discard"
    }

    fn usage(&self) -> &'static str {
        "discard"
    }

    fn description(&self) -> &'static str {
        "Discards a script with its variables, tasks, and event listeners."
    }

    fn execute(&self, registry: &ScriptRegistry, source: &dyn CommandSource, _args: &[&str]) -> CommandResult {
        match registry.discard_for(source) {
            Ok(DiscardOutcome::Discarded(_)) => {
                source.send_message("Discarded the script.");
                CommandResult::Success
            }
            Ok(DiscardOutcome::NoSelection) => {
                notify_missing_selection(source);
                CommandResult::Success
            }
            Ok(DiscardOutcome::NotRunning { .. }) => {
                source.send_message("The script is not active.");
                CommandResult::Success
            }
            Err(DiscardError::NoSelectorContext) => {
                notify_invalid_selector(source);
                CommandResult::Empty
            }
            Err(DiscardError::Teardown { script, source: err }) => {
                warn!(target: "commands", "Discard of {} left {} handle(s) behind", script, err.failures.len());
                source.send_message(&format!(
                    "Failed to discard {}: {} resource(s) could not be released. Try again.",
                    script,
                    err.failures.len()
                ));
                CommandResult::Empty
            }
        }
    }
}
