//! Change detection over a [`ValueSource`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::ValueSource;

/// How push sessions share change-detection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerScope {
    /// Every session gets its own tracker and sees every change.
    #[default]
    PerSession,
    /// All sessions and the pull endpoint share one tracker. A change
    /// observed by one of them is not reported to the others.
    Shared,
}

impl TrackerScope {
    /// Wire/config name of the scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerSession => "per_session",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for TrackerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remembers the last value observed from a source and reports only changes.
pub struct ChangeTracker {
    source: Arc<dyn ValueSource>,
    /// Empty until the first observation.
    last: Mutex<String>,
}

impl ChangeTracker {
    /// Tracker that has observed nothing yet.
    pub fn new(source: Arc<dyn ValueSource>) -> Self {
        Self::seeded(source, String::new())
    }

    /// Tracker that treats `last` as already observed.
    pub fn seeded(source: Arc<dyn ValueSource>, last: impl Into<String>) -> Self {
        Self {
            source,
            last: Mutex::new(last.into()),
        }
    }

    /// Read the source; return the value if it differs from the last
    /// observation, recording it as observed.
    ///
    /// The source is read under the lock, so concurrent observers see
    /// values in the order the source produced them.
    pub fn observe(&self) -> Option<String> {
        let mut last = self.last.lock();
        let current = self.source.now();
        if *last == current {
            return None;
        }
        last.clone_from(&current);
        Some(current)
    }

    /// The last observed value, `None` before the first observation.
    pub fn last_value(&self) -> Option<String> {
        let last = self.last.lock();
        (!last.is_empty()).then(|| last.clone())
    }

    /// Forget the last observation; the next [`observe`](Self::observe)
    /// reports a change.
    pub fn reset(&self) {
        self.last.lock().clear();
    }

    /// A fresh tracker over the same source.
    pub fn for_session(&self) -> Self {
        Self::new(Arc::clone(&self.source))
    }
}

impl fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("last", &*self.last.lock())
            .finish_non_exhaustive()
    }
}
