use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use chatrelay_core::error::{RelayError, Result};

use crate::realtime::types::{MessageSink, SessionId};

/// Connection registry: `session_id -> sink`.
///
/// Safe for concurrent register/unregister/iterate. Iteration works on a
/// snapshot so callbacks never run while a shard lock is held.
pub struct ConnectionRegistry {
    sinks: DashMap<SessionId, Arc<dyn MessageSink>>,
    seq: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            sinks: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh id. Ids come from a counter, so they never repeat
    /// within this registry.
    pub fn next_id(&self) -> SessionId {
        SessionId::from_seq(self.seq.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register(&self, id: SessionId, sink: Arc<dyn MessageSink>) -> Result<()> {
        match self.sinks.entry(id) {
            Entry::Occupied(e) => Err(RelayError::DuplicateId(e.key().to_string())),
            Entry::Vacant(e) => {
                e.insert(sink);
                Ok(())
            }
        }
    }

    /// Idempotent. Returns true if this call removed the entry.
    pub fn unregister(&self, id: &SessionId) -> bool {
        self.sinks.remove(id).is_some()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sinks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sinks.iter().map(|e| e.key().clone()).collect()
    }

    /// Clone out every sink except `exclude`. Shard locks are released
    /// before this returns.
    pub fn snapshot_except(&self, exclude: Option<&SessionId>) -> Vec<(SessionId, Arc<dyn MessageSink>)> {
        self.sinks
            .iter()
            .filter(|e| Some(e.key()) != exclude)
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    /// Run `f` for every registered sink except `exclude`.
    ///
    /// Entries added or removed while this runs may or may not be visited.
    /// `f` may call back into the registry (including `unregister`).
    pub fn for_each_except<F>(&self, exclude: Option<&SessionId>, mut f: F)
    where
        F: FnMut(&SessionId, &Arc<dyn MessageSink>),
    {
        for (id, sink) in self.snapshot_except(exclude) {
            f(&id, &sink);
        }
    }
}
