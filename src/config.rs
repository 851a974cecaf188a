use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Helper function for default true value
fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["groovy".to_string(), "kts".to_string(), "js".to_string()]
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "lazoyoung", "craftgames")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptingConfig {
    /// Whether scripting is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory containing script sources (default: <data dir>/scripts)
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// File extensions treated as script sources
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Whether the server console may select and discard scripts
    #[serde(default = "default_true")]
    pub console_selector: bool,

    /// How often the task scheduler ticks, in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script_dir: None,
            extensions: default_extensions(),
            console_selector: true,
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl ScriptingConfig {
    /// Get the script directory path (use provided or default)
    pub fn script_dir(&self) -> PathBuf {
        self.script_dir.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|d| d.data_dir().join("scripts"))
                .unwrap_or_else(|| PathBuf::from("scripts"))
        })
    }

    /// Scheduler tick interval, never shorter than one millisecond
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file in the data directory
    #[serde(default)]
    pub file: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftgamesConfig {
    /// Scripting configuration
    #[serde(default)]
    pub scripting: ScriptingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CraftgamesConfig {
    pub fn config_path() -> PathBuf {
        project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("craftgames.toml"))
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content).with_context(|| format!("Failed to write config {}", path.display()))?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}
