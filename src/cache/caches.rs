//! Cache tables shared by the registry decorator and its talk wrappers.

use crate::talk::domain::{Document, RepoName, TalkName, TalkNumber};
use crate::talk::ports::TalkHandle;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Capacity and expiry of the talk caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Most entries kept per table.
    pub capacity: u64,
    /// Lifetime of the memoized `recent` aggregate.
    pub recent_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            recent_ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) enum Lookup {
    Number(TalkNumber),
    Name(TalkName),
}

pub(super) type TalkList = Arc<Vec<TalkHandle>>;

pub(super) struct TalkCaches {
    pub(super) documents: Cache<TalkName, Document>,
    pub(super) updated: Cache<TalkName, DateTime<Utc>>,
    pub(super) flags: Cache<TalkName, bool>,
    pub(super) present: Cache<Lookup, bool>,
    pub(super) handles: Cache<Lookup, TalkHandle>,
    pub(super) active: Cache<(), TalkList>,
    pub(super) siblings: Cache<(RepoName, DateTime<Utc>), TalkList>,
    pub(super) recent: Cache<(), TalkList>,
}

impl TalkCaches {
    pub(super) fn new(settings: CacheSettings) -> Self {
        Self {
            documents: Cache::new(settings.capacity),
            updated: Cache::new(settings.capacity),
            flags: Cache::new(settings.capacity),
            present: Cache::new(settings.capacity),
            handles: Cache::new(settings.capacity),
            active: Cache::new(1),
            siblings: Cache::new(settings.capacity),
            recent: Cache::builder()
                .max_capacity(1)
                .time_to_live(settings.recent_ttl)
                .build(),
        }
    }

    /// Drops everything memoized about one talk's contents.
    pub(super) fn forget_contents(&self, name: &TalkName) {
        self.documents.invalidate(name);
        self.updated.invalidate(name);
    }

    /// Drops the aggregates that depend on lifecycle flags or timestamps.
    pub(super) fn forget_listings(&self) {
        self.active.invalidate(&());
        self.siblings.invalidate_all();
    }

    /// Drops every entry keyed by the talk's identity.
    pub(super) fn forget_identity(&self, name: &TalkName) {
        let numbers: Vec<TalkNumber> = self
            .handles
            .iter()
            .filter(|(_, handle)| handle.name() == name)
            .map(|(_, handle)| handle.number())
            .collect();
        for number in numbers {
            self.present.invalidate(&Lookup::Number(number));
            self.handles.invalidate(&Lookup::Number(number));
        }
        let key = Lookup::Name(name.clone());
        self.present.invalidate(&key);
        self.handles.invalidate(&key);
        self.flags.invalidate(name);
        self.forget_contents(name);
    }
}
