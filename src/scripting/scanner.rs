//! Discovery of script source files
//!
//! Parsing script text belongs to the authoring layer; the scanner only finds the
//! files and registers one not-yet-running script per file, named by file stem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::error::RegistryError;
use super::registry::ScriptRegistry;
use super::script::Script;

/// A script source file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    /// File name without extension
    pub name: String,
    pub path: PathBuf,
}

/// List script sources in `dir` whose extension is one of `extensions`
///
/// Hidden files and subdirectories are skipped. A missing directory yields an
/// empty list. Results are sorted by name.
pub fn scan_dir(dir: &Path, extensions: &[String]) -> std::io::Result<Vec<ScriptSource>> {
    if !dir.exists() {
        debug!(target: "scripting", "Script directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if name.is_empty() || name.starts_with('.') {
            continue;
        }

        let wanted = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if !wanted {
            continue;
        }

        sources.push(ScriptSource {
            name: name.to_string(),
            path: path.clone(),
        });
    }

    sources.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    Ok(sources)
}

/// Register every script found in `dir`, returning the new scripts
///
/// A name that is already registered (including a second file with the same stem)
/// is skipped with a warning.
pub fn register_dir(
    registry: &ScriptRegistry,
    dir: &Path,
    extensions: &[String],
) -> std::io::Result<Vec<Arc<Script>>> {
    let mut registered = Vec::new();

    for source in scan_dir(dir, extensions)? {
        match registry.create_script(source.name.clone()) {
            Ok(script) => {
                debug!(target: "scripting", "Found script {} at {}", source.name, source.path.display());
                registered.push(script);
            }
            Err(RegistryError::DuplicateName(name)) => {
                warn!(target: "scripting", "Skipping {}: script '{}' already registered", source.path.display(), name);
            }
            Err(e) => {
                warn!(target: "scripting", "Skipping {}: {}", source.path.display(), e);
            }
        }
    }

    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostServices;
    use std::fs;

    fn extensions() -> Vec<String> {
        vec!["groovy".to_string(), "kts".to_string()]
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lobby.groovy"), "").unwrap();
        fs::write(dir.path().join("arena.KTS"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join(".hidden.groovy"), "").unwrap();
        fs::create_dir(dir.path().join("nested.groovy")).unwrap();

        let names: Vec<String> = scan_dir(dir.path(), &extensions())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();

        assert_eq!(names, vec!["arena".to_string(), "lobby".to_string()]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sources = scan_dir(&dir.path().join("nope"), &extensions()).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_register_dir_skips_duplicate_stems() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lobby.groovy"), "").unwrap();
        fs::write(dir.path().join("lobby.kts"), "").unwrap();
        fs::write(dir.path().join("arena.groovy"), "").unwrap();

        let (host, _bus, _timers) = HostServices::in_process();
        let registry = ScriptRegistry::new(host);
        let scripts = register_dir(&registry, dir.path(), &extensions()).unwrap();

        assert_eq!(scripts.len(), 2);
        assert_eq!(registry.script_names(), vec!["arena".to_string(), "lobby".to_string()]);
        assert!(scripts.iter().all(|s| !s.is_running()));
    }
}
