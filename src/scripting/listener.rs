use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{ResourceKind, TeardownError};
use super::handles;
use crate::host::{EventHandler, EventHost, EventKind, HostError, ListenerHandle};

/// Event listeners a script has installed into the host
///
/// The set is the only record of which handles are still installed; the owning
/// script guards it with its state lock.
pub struct ListenerSet {
    host: Arc<dyn EventHost>,
    handles: BTreeMap<ListenerHandle, EventKind>,
}

impl ListenerSet {
    pub fn new(host: Arc<dyn EventHost>) -> Self {
        Self {
            host,
            handles: BTreeMap::new(),
        }
    }

    /// Subscribe through the host and remember the handle
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> Result<ListenerHandle, HostError> {
        let handle = self.host.subscribe(kind.clone(), handler)?;
        self.handles.insert(handle, kind);
        Ok(handle)
    }

    /// Unsubscribe every listener, returning how many were removed
    pub fn unregister_all(&mut self) -> Result<usize, TeardownError> {
        let host = self.host.clone();
        handles::drain(
            &mut self.handles,
            ResourceKind::Listener,
            ListenerHandle::raw,
            |handle| host.unsubscribe(handle),
        )
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, handle: ListenerHandle) -> bool {
        self.handles.contains_key(&handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = (ListenerHandle, &EventKind)> + '_ {
        self.handles.iter().map(|(handle, kind)| (*handle, kind))
    }
}
