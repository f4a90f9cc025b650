//! Registry of live push sessions.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// Unique push session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new time-ordered ID.
    pub fn new() -> Self {
        Self(format!("push_{}", Uuid::now_v7()))
    }

    /// The ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracks live sessions and enforces the connection limit.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Instant>,
    /// Reserved slots; can briefly exceed `sessions.len()` while a guard
    /// is being created or dropped.
    reserved: AtomicUsize,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Registry admitting at most `max_sessions` concurrent sessions.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            reserved: AtomicUsize::new(0),
            max_sessions,
        }
    }

    /// Register a new session, or `None` if the registry is full.
    ///
    /// The session stays registered until the returned guard is dropped.
    pub fn try_register(self: &Arc<Self>) -> Option<SessionGuard> {
        let max = self.max_sessions;
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;

        let id = SessionId::new();
        let _ = self.sessions.insert(id.clone(), Instant::now());
        Some(SessionGuard {
            id,
            registry: Arc::clone(self),
        })
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Configured session limit.
    pub fn capacity(&self) -> usize {
        self.max_sessions
    }

    fn release(&self, id: &SessionId) {
        if self.sessions.remove(id).is_some() {
            let _ = self.reserved.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Keeps a session registered; deregisters on drop.
pub struct SessionGuard {
    id: SessionId,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    /// ID of the guarded session.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Time since the session was registered.
    pub fn age(&self) -> Duration {
        self.registry
            .sessions
            .get(&self.id)
            .map_or(Duration::ZERO, |started| started.elapsed())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}
