//! Caching decorator around a talk registry.

use super::caches::{CacheSettings, Lookup, TalkCaches, TalkList};
use super::talk::CachedTalk;
use crate::talk::domain::{RepoName, TalkName, TalkNumber};
use crate::talk::ports::{TalkHandle, TalkStoreResult, Talks};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Registry decorator memoizing lookups and listings.
///
/// Existence checks are remembered only when positive, so a talk created
/// after a negative answer is found on the next call.
pub struct CachedTalks<T> {
    inner: Arc<T>,
    caches: Arc<TalkCaches>,
}

impl<T> Clone for CachedTalks<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            caches: Arc::clone(&self.caches),
        }
    }
}

impl<T> CachedTalks<T>
where
    T: Talks,
{
    /// Wraps a registry with default cache settings.
    #[must_use]
    pub fn new(inner: Arc<T>) -> Self {
        Self::with_settings(inner, CacheSettings::default())
    }

    /// Wraps a registry with explicit cache settings.
    #[must_use]
    pub fn with_settings(inner: Arc<T>, settings: CacheSettings) -> Self {
        Self {
            inner,
            caches: Arc::new(TalkCaches::new(settings)),
        }
    }

    fn wrap_all(&self, handles: Vec<TalkHandle>) -> TalkList {
        Arc::new(
            handles
                .into_iter()
                .map(|handle| CachedTalk::wrap(handle, &self.caches))
                .collect(),
        )
    }

    async fn present(&self, key: Lookup) -> TalkStoreResult<bool> {
        if self.caches.present.get(&key).is_some() {
            return Ok(true);
        }
        let found = match &key {
            Lookup::Number(number) => self.inner.exists(*number).await?,
            Lookup::Name(name) => self.inner.exists_named(name).await?,
        };
        if found {
            self.caches.present.insert(key, true);
        }
        Ok(found)
    }

    async fn handle(&self, key: Lookup) -> TalkStoreResult<TalkHandle> {
        if let Some(handle) = self.caches.handles.get(&key) {
            return Ok(handle);
        }
        let inner = match &key {
            Lookup::Number(number) => self.inner.get(*number).await?,
            Lookup::Name(name) => self.inner.get_named(name).await?,
        };
        let wrapped = CachedTalk::wrap(inner, &self.caches);
        self.caches.handles.insert(key, Arc::clone(&wrapped));
        Ok(wrapped)
    }
}

#[async_trait]
impl<T> Talks for CachedTalks<T>
where
    T: Talks,
{
    async fn exists(&self, number: TalkNumber) -> TalkStoreResult<bool> {
        self.present(Lookup::Number(number)).await
    }

    async fn exists_named(&self, name: &TalkName) -> TalkStoreResult<bool> {
        self.present(Lookup::Name(name.clone())).await
    }

    async fn get(&self, number: TalkNumber) -> TalkStoreResult<TalkHandle> {
        self.handle(Lookup::Number(number)).await
    }

    async fn get_named(&self, name: &TalkName) -> TalkStoreResult<TalkHandle> {
        self.handle(Lookup::Name(name.clone())).await
    }

    async fn create(&self, repo: &RepoName, name: &TalkName) -> TalkStoreResult<TalkNumber> {
        self.caches.forget_identity(name);
        self.caches.forget_listings();
        self.inner.create(repo, name).await
    }

    async fn delete(&self, name: &TalkName) -> TalkStoreResult<()> {
        self.caches.forget_identity(name);
        self.caches.forget_listings();
        self.inner.delete(name).await
    }

    async fn active(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        if let Some(list) = self.caches.active.get(&()) {
            return Ok(list.as_ref().clone());
        }
        let list = self.wrap_all(self.inner.active().await?);
        self.caches.active.insert((), Arc::clone(&list));
        Ok(list.as_ref().clone())
    }

    async fn recent(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        if let Some(list) = self.caches.recent.get(&()) {
            return Ok(list.as_ref().clone());
        }
        let list = self.wrap_all(self.inner.recent().await?);
        self.caches.recent.insert((), Arc::clone(&list));
        Ok(list.as_ref().clone())
    }

    async fn siblings(&self, repo: &RepoName, since: DateTime<Utc>) -> TalkStoreResult<Vec<TalkHandle>> {
        let key = (repo.clone(), since);
        if let Some(list) = self.caches.siblings.get(&key) {
            return Ok(list.as_ref().clone());
        }
        let list = self.wrap_all(self.inner.siblings(repo, since).await?);
        self.caches.siblings.insert(key, Arc::clone(&list));
        Ok(list.as_ref().clone())
    }
}
