//! Read-through caching decorator for the talk store.
//!
//! [`CachedTalks`] wraps any [`Talks`](crate::talk::ports::Talks) registry and
//! hands out [`CachedTalk`] wrappers that share its caches. Reads are memoized
//! per call signature; every mutating call drops the affected entries before
//! it reaches the backing store, so the next read for that key is never
//! served stale.

mod caches;
mod talk;
mod talks;

pub use caches::CacheSettings;
pub use talk::CachedTalk;
pub use talks::CachedTalks;

#[cfg(test)]
mod tests;
