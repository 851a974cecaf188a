use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

use craftgames::commands::CommandDispatcher;
use craftgames::config::CraftgamesConfig;
use craftgames::host::{EventBus, EventKind, GameEvent, HostServices, TaskSpec};
use craftgames::logging::init_logging;
use craftgames::scripting::{self, CommandSource, ScriptError, ScriptRegistry, Selector, SourceKind};

#[derive(Parser)]
#[command(version, about = "Interactive console for the craftgames script registry", long_about = None)]
pub struct Cli {
    /// Enables debug mode
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to load scripts from (overrides the config)
    #[arg(short, long)]
    script_dir: Option<PathBuf>,
}

/// The server console as a command source
struct ConsoleSource;

impl CommandSource for ConsoleSource {
    fn name(&self) -> &str {
        "CONSOLE"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Console
    }

    fn send_message(&self, message: &str) {
        println!("{}", message);
    }

    fn has_permission(&self, _permission: &str) -> bool {
        true
    }
}

/// Start the console's selected script with a demo set of listeners and tasks
///
/// Stands in for the script engine, which would normally install these.
fn start_selected(registry: &ScriptRegistry, source: &ConsoleSource) {
    let Some(script) = registry.get_selection(&Selector::Console) else {
        source.send_message("You have not selected a script.");
        return;
    };

    let name = script.name().to_string();
    let result = script.start(|scope| {
        let chat_name = name.clone();
        scope.subscribe(
            EventKind::PlayerChat,
            Arc::new(move |event: &GameEvent| {
                if let GameEvent::PlayerChat { message, .. } = event {
                    info!(target: "scripting", "[{}] chat: {}", chat_name, message);
                }
            }),
        )?;

        let join_name = name.clone();
        scope.subscribe(
            EventKind::PlayerJoin,
            Arc::new(move |event: &GameEvent| {
                if let GameEvent::PlayerJoin { name, .. } = event {
                    info!(target: "scripting", "[{}] welcome, {}", join_name, name);
                }
            }),
        )?;

        let beat_name = name.clone();
        scope.schedule(TaskSpec::repeating(
            "heartbeat",
            Duration::from_secs(5),
            Arc::new(move || info!(target: "scripting", "[{}] heartbeat", beat_name)),
        ))?;
        Ok(())
    });

    match result {
        Ok(()) => source.send_message(&format!("Started script {}.", name)),
        Err(ScriptError::AlreadyRunning(_)) => source.send_message("The script is already running."),
        Err(e) => source.send_message(&format!("Could not start {}: {}", name, e)),
    }
}

/// Simulate a game event coming from the server
fn emit(bus: &EventBus, source: &ConsoleSource, args: &[&str]) {
    let player = Uuid::new_v4();
    let event = match args {
        ["chat", words @ ..] => GameEvent::PlayerChat {
            player,
            message: words.join(" "),
        },
        ["join", name] => GameEvent::PlayerJoin {
            player,
            name: name.to_string(),
        },
        ["death", entity] => GameEvent::EntityDeath {
            entity: entity.to_string(),
        },
        [name, payload @ ..] => GameEvent::Custom {
            name: name.to_string(),
            payload: payload.join(" "),
        },
        [] => {
            source.send_message("Usage: emit <chat|join|death|custom> [args...]");
            return;
        }
    };

    let delivered = bus.dispatch(&event);
    source.send_message(&format!("Delivered to {} listener(s).", delivered));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(CraftgamesConfig::config_path);
    let mut config = CraftgamesConfig::load_or_default(&config_path)?;
    if let Some(dir) = cli.script_dir {
        config.scripting.script_dir = Some(dir);
    }

    let level = match cli.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _guard = init_logging("cli", config.logging.file, level)?;

    info!("Starting craftgames console...");

    let (host, bus, timers) = HostServices::in_process();
    let registry = Arc::new(ScriptRegistry::with_config(host, &config.scripting));

    if config.scripting.enabled {
        let dir = config.scripting.script_dir();
        match scripting::register_dir(&registry, &dir, &config.scripting.extensions) {
            Ok(scripts) => info!("Loaded {} script(s) from {}", scripts.len(), dir.display()),
            Err(e) => warn!("Failed to scan {}: {}", dir.display(), e),
        }
    } else {
        info!("Scripting is disabled in the config");
    }

    let tick_interval = config.scripting.tick_interval();
    let ticker = tokio::spawn({
        let timers = timers.clone();
        async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                timers.tick(Instant::now());
            }
        }
    });

    let dispatcher = CommandDispatcher::new();
    let console = ConsoleSource;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type 'help' for script commands, 'start', 'emit ...', or 'quit'.");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let line = line.trim();
        let line = line.strip_prefix("/script ").unwrap_or(line);
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] => break,
            ["start"] => start_selected(&registry, &console),
            ["emit", args @ ..] => emit(&bus, &console, args),
            _ => {
                dispatcher.dispatch(&registry, &console, line);
            }
        }
    }

    ticker.abort();

    let live: Vec<_> = registry
        .script_names()
        .into_iter()
        .filter_map(|name| registry.get_script(&name))
        .filter(|script| script.is_running())
        .collect();
    for script in live {
        if let Err(e) = registry.discard_script(&script) {
            warn!("Shutdown left script {} behind: {}", script.name(), e);
        }
    }

    info!("Console closed");
    Ok(())
}
