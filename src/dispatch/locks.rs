//! Per-talk exclusion markers.

use crate::talk::domain::TalkName;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Markers naming the talks currently owned by a worker.
#[derive(Debug, Clone, Default)]
pub struct TalkLocks {
    markers: Arc<DashMap<TalkName, Uuid>>,
}

impl TalkLocks {
    /// Creates an empty marker table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a marker on `talk`, or returns `None` when one is already held.
    #[must_use]
    pub fn try_acquire(&self, talk: &TalkName) -> Option<TalkLock> {
        match self.markers.entry(talk.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let marker = Uuid::new_v4();
                slot.insert(marker);
                tracing::trace!(talk = %talk, %marker, "talk marker placed");
                Some(TalkLock {
                    markers: Arc::clone(&self.markers),
                    talk: talk.clone(),
                    marker,
                })
            }
        }
    }

    /// Returns `true` while some worker holds the marker of `talk`.
    #[must_use]
    pub fn is_held(&self, talk: &TalkName) -> bool {
        self.markers.contains_key(talk)
    }
}

/// A held marker; dropping it frees the talk.
pub struct TalkLock {
    markers: Arc<DashMap<TalkName, Uuid>>,
    talk: TalkName,
    marker: Uuid,
}

impl TalkLock {
    /// The talk this marker protects.
    #[must_use]
    pub const fn talk(&self) -> &TalkName {
        &self.talk
    }
}

impl fmt::Debug for TalkLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TalkLock")
            .field("talk", &self.talk)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

impl Drop for TalkLock {
    fn drop(&mut self) {
        let marker = self.marker;
        if self.markers.remove_if(&self.talk, |_, held| *held == marker).is_some() {
            tracing::trace!(talk = %self.talk, %marker, "talk marker removed");
        }
    }
}
