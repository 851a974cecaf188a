use std::collections::BTreeMap;

use tracing::warn;

use super::error::{HandleFailure, ResourceKind, TeardownError};
use crate::host::HostError;

/// Remove every handle in `handles` through `remove`, best effort
///
/// A handle leaves the map only once the host confirmed it is gone (or the host
/// no longer knows it), so a failed handle stays for the next attempt and a
/// removed one is never handed to the host again.
pub(crate) fn drain<H, V, F>(
    handles: &mut BTreeMap<H, V>,
    resource: ResourceKind,
    raw: impl Fn(&H) -> u64,
    mut remove: F,
) -> Result<usize, TeardownError>
where
    H: Ord + Copy,
    F: FnMut(H) -> Result<(), HostError>,
{
    let pending: Vec<H> = handles.keys().copied().collect();
    let mut removed = 0;
    let mut failures = Vec::new();

    for handle in pending {
        match remove(handle) {
            Ok(()) => {
                handles.remove(&handle);
                removed += 1;
            }
            Err(HostError::UnknownHandle(_)) => {
                warn!(target: "scripting", "Host already dropped {}#{}", resource, raw(&handle));
                handles.remove(&handle);
            }
            Err(error) => {
                warn!(target: "scripting", "Failed to remove {}#{}: {}", resource, raw(&handle), error);
                failures.push(HandleFailure {
                    resource,
                    handle: raw(&handle),
                    error,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(removed)
    } else {
        Err(TeardownError { failures })
    }
}
