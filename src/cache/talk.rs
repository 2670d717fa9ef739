//! Caching wrapper around a single talk.

use super::caches::TalkCaches;
use crate::talk::domain::{Document, Patch, TalkName, TalkNumber};
use crate::talk::ports::{Talk, TalkHandle, TalkStoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// A talk whose reads are memoized until the next write.
pub struct CachedTalk {
    inner: TalkHandle,
    caches: Arc<TalkCaches>,
}

impl CachedTalk {
    pub(super) fn wrap(inner: TalkHandle, caches: &Arc<TalkCaches>) -> TalkHandle {
        Arc::new(Self {
            inner,
            caches: Arc::clone(caches),
        })
    }
}

impl fmt::Debug for CachedTalk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedTalk")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Talk for CachedTalk {
    fn number(&self) -> TalkNumber {
        self.inner.number()
    }

    fn name(&self) -> &TalkName {
        self.inner.name()
    }

    async fn read(&self) -> TalkStoreResult<Document> {
        if let Some(document) = self.caches.documents.get(self.name()) {
            return Ok(document);
        }
        let document = self.inner.read().await?;
        self.caches
            .documents
            .insert(self.name().clone(), document.clone());
        Ok(document)
    }

    async fn modify(&self, patch: &Patch) -> TalkStoreResult<()> {
        self.caches.forget_contents(self.name());
        self.caches.siblings.invalidate_all();
        self.inner.modify(patch).await
    }

    async fn updated(&self) -> TalkStoreResult<DateTime<Utc>> {
        if let Some(updated) = self.caches.updated.get(self.name()) {
            return Ok(updated);
        }
        let updated = self.inner.updated().await?;
        self.caches.updated.insert(self.name().clone(), updated);
        Ok(updated)
    }

    async fn is_active(&self) -> TalkStoreResult<bool> {
        if let Some(active) = self.caches.flags.get(self.name()) {
            return Ok(active);
        }
        let active = self.inner.is_active().await?;
        self.caches.flags.insert(self.name().clone(), active);
        Ok(active)
    }

    async fn set_active(&self, active: bool) -> TalkStoreResult<()> {
        self.caches.flags.invalidate(self.name());
        self.caches.updated.invalidate(self.name());
        self.caches.forget_listings();
        self.inner.set_active(active).await
    }
}
