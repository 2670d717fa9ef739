//! Limits and query rules shared by the store adapters.

use crate::talk::domain::{Document, Patch, RepoName, TalkRecord};
use crate::talk::ports::{TalkStoreError, TalkStoreResult};
use chrono::{DateTime, TimeDelta, Utc};

/// Tunables common to every talk store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Largest accepted document, in encoded bytes.
    pub max_document_bytes: usize,
    /// Most talks returned by `recent`.
    pub recent_limit: usize,
    /// Oldest update still considered recent.
    pub recent_window: TimeDelta,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_document_bytes: 400 * 1024,
            recent_limit: 5,
            recent_window: TimeDelta::days(7),
        }
    }
}

/// Computes the document a patch would store, or `None` for a no-op.
pub(crate) fn prepare_write(
    record: &TalkRecord,
    patch: &Patch,
    settings: &StoreSettings,
) -> TalkStoreResult<Option<Document>> {
    if !record.active {
        return Err(TalkStoreError::Inactive(record.name.clone()));
    }
    if patch.is_empty() {
        return Ok(None);
    }
    let next = patch
        .apply(&record.document)
        .map_err(|source| TalkStoreError::Patch {
            name: record.name.clone(),
            source,
        })?;
    if next == record.document {
        return Ok(None);
    }
    let size = serde_json::to_vec(&next)
        .map_err(TalkStoreError::persistence)?
        .len();
    if size > settings.max_document_bytes {
        return Err(TalkStoreError::TooLarge {
            name: record.name.clone(),
            size,
            limit: settings.max_document_bytes,
        });
    }
    Ok(Some(next))
}

/// Active records, ascending by number.
pub(crate) fn active_of<'a>(records: impl Iterator<Item = &'a TalkRecord>) -> Vec<&'a TalkRecord> {
    let mut found: Vec<_> = records.filter(|record| record.active).collect();
    found.sort_by_key(|record| record.number);
    found
}

/// Inactive records inside the recent window, newest first, capped.
pub(crate) fn recent_of<'a>(
    records: impl Iterator<Item = &'a TalkRecord>,
    now: DateTime<Utc>,
    settings: &StoreSettings,
) -> Vec<&'a TalkRecord> {
    let horizon = now - settings.recent_window;
    let mut found: Vec<_> = records
        .filter(|record| !record.active && record.updated >= horizon)
        .collect();
    found.sort_by(|left, right| right.updated.cmp(&left.updated));
    found.truncate(settings.recent_limit);
    found
}

/// Records of `repo` updated strictly after `since`, newest first.
pub(crate) fn siblings_of<'a>(
    records: impl Iterator<Item = &'a TalkRecord>,
    repo: &RepoName,
    since: DateTime<Utc>,
) -> Vec<&'a TalkRecord> {
    let mut found: Vec<_> = records
        .filter(|record| &record.repo == repo && record.updated > since)
        .collect();
    found.sort_by(|left, right| right.updated.cmp(&left.updated));
    found
}
