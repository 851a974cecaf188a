use super::{CommandResult, ScriptCommand, notify_invalid_selector, notify_missing_selection};
use crate::scripting::{CommandSource, ScriptRegistry};

/// `/script info`: details about the selected script
pub struct InfoScriptCommand;

impl ScriptCommand for InfoScriptCommand {
    fn name(&self) -> &'static str {
        "info"
    }

    fn usage(&self) -> &'static str {
        "info"
    }

    fn description(&self) -> &'static str {
        "Shows the state of the selected script."
    }

    fn execute(&self, registry: &ScriptRegistry, source: &dyn CommandSource, _args: &[&str]) -> CommandResult {
        let Ok(selector) = registry.resolve_selector(source) else {
            notify_invalid_selector(source);
            return CommandResult::Empty;
        };
        let Some(script) = registry.get_selection(&selector) else {
            notify_missing_selection(source);
            return CommandResult::Success;
        };

        source.send_message(&format!("Script {} ({})", script.name(), script.id()));
        source.send_message(&format!("State: {}", script.run_state()));
        if let Some(started) = script.started_at() {
            source.send_message(&format!("Started: {}", started.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        source.send_message(&format!(
            "Listeners: {}, tasks: {}",
            script.listener_count(),
            script.task_count()
        ));
        CommandResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::RecordingSource;
    use crate::host::{EventKind, GameEvent, HostServices};
    use crate::scripting::Selector;
    use std::sync::Arc;

    #[test]
    fn test_info_reports_resources() {
        let (host, _bus, _timers) = HostServices::in_process();
        let registry = ScriptRegistry::new(host);
        registry
            .create_script("arena")
            .unwrap()
            .start(|scope| {
                scope.subscribe(EventKind::BlockPlace, Arc::new(|_: &GameEvent| {}))?;
                scope.subscribe(EventKind::BlockBreak, Arc::new(|_: &GameEvent| {}))?;
                Ok(())
            })
            .unwrap();
        registry.select(Selector::Console, "arena").unwrap();

        let source = RecordingSource::console();
        assert_eq!(InfoScriptCommand.execute(&registry, &source, &[]), CommandResult::Success);

        let messages = source.messages.lock();
        assert_eq!(messages[1], "State: running");
        assert_eq!(messages.last().unwrap(), "Listeners: 2, tasks: 0");
    }
}
