use std::fmt;

use thiserror::Error;

use crate::host::HostError;

/// Which kind of script resource a teardown failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ResourceKind {
    #[strum(serialize = "listener")]
    Listener,
    #[strum(serialize = "task")]
    Task,
}

/// One handle the host refused to remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleFailure {
    pub resource: ResourceKind,
    pub handle: u64,
    pub error: HostError,
}

impl fmt::Display for HandleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}: {}", self.resource, self.handle, self.error)
    }
}

/// Aggregate of every handle that could not be torn down in one pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} handle(s) could not be removed: {}", .failures.len(), join_failures(.failures))]
pub struct TeardownError {
    pub failures: Vec<HandleFailure>,
}

impl TeardownError {
    pub(crate) fn merge(first: Option<Self>, second: Option<Self>) -> Option<Self> {
        match (first, second) {
            (None, None) => None,
            (Some(e), None) | (None, Some(e)) => Some(e),
            (Some(mut a), Some(b)) => {
                a.failures.extend(b.failures);
                Some(a)
            }
        }
    }

    pub fn count(&self, resource: ResourceKind) -> usize {
        self.failures.iter().filter(|f| f.resource == resource).count()
    }
}

fn join_failures(failures: &[HandleFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from operating on a single script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script '{0}' is already running")]
    AlreadyRunning(String),
    #[error("script '{0}' is not running")]
    NotRunning(String),
    #[error("script '{0}' has been discarded")]
    Discarded(String),
    #[error("host refused the request: {0}")]
    Host(#[from] HostError),
    #[error("script setup failed: {0}")]
    Setup(String),
}

/// Errors from registry bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The caller has no identity usable as a selector
    #[error("the command source cannot act as a script selector")]
    NoSelectorContext,
    #[error("a script named '{0}' is already registered")]
    DuplicateName(String),
    #[error("no script named '{0}' is registered")]
    UnknownScript(String),
}

/// Failures of the discard protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscardError {
    #[error("the command source cannot act as a script selector")]
    NoSelectorContext,
    /// Some handles survived teardown; the script is still running and registered
    #[error("failed to discard script '{script}': {source}")]
    Teardown {
        script: String,
        #[source]
        source: TeardownError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(resource: ResourceKind, handle: u64) -> HandleFailure {
        HandleFailure {
            resource,
            handle,
            error: HostError::Rejected {
                handle,
                reason: "busy".to_string(),
            },
        }
    }

    #[test]
    fn test_merge_keeps_all_failures() {
        let listeners = TeardownError {
            failures: vec![failure(ResourceKind::Listener, 1)],
        };
        let tasks = TeardownError {
            failures: vec![failure(ResourceKind::Task, 7), failure(ResourceKind::Task, 8)],
        };

        let merged = TeardownError::merge(Some(listeners), Some(tasks)).unwrap();
        assert_eq!(merged.count(ResourceKind::Listener), 1);
        assert_eq!(merged.count(ResourceKind::Task), 2);
        assert!(TeardownError::merge(None, None).is_none());
    }

    #[test]
    fn test_teardown_error_message() {
        let err = TeardownError {
            failures: vec![failure(ResourceKind::Task, 3)],
        };

        assert_eq!(
            err.to_string(),
            "1 handle(s) could not be removed: task#3: handle 3 rejected: busy"
        );
    }
}
