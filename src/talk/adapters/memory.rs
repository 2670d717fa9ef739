//! In-memory talk store for tests and ephemeral runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::settings::{StoreSettings, active_of, prepare_write, recent_of, siblings_of};
use crate::talk::{
    domain::{Document, Patch, RepoName, TalkName, TalkNumber, TalkRecord},
    ports::{Talk, TalkHandle, TalkStoreError, TalkStoreResult, Talks},
};

/// Thread-safe in-memory talk registry.
pub struct InMemoryTalks<C> {
    shared: Arc<Shared<C>>,
}

struct Shared<C> {
    state: RwLock<InMemoryTalkState>,
    clock: Arc<C>,
    settings: StoreSettings,
}

#[derive(Debug, Default)]
struct InMemoryTalkState {
    records: BTreeMap<TalkNumber, TalkRecord>,
    names: HashMap<TalkName, TalkNumber>,
    last: u64,
}

impl<C> Clone for InMemoryTalks<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> fmt::Debug for InMemoryTalks<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTalks")
            .field("settings", &self.shared.settings)
            .finish_non_exhaustive()
    }
}

impl<C> InMemoryTalks<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty registry with default settings.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self::with_settings(clock, StoreSettings::default())
    }

    /// Creates an empty registry with explicit settings.
    #[must_use]
    pub fn with_settings(clock: Arc<C>, settings: StoreSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(InMemoryTalkState::default()),
                clock,
                settings,
            }),
        }
    }

    fn handle(&self, record: &TalkRecord) -> TalkHandle {
        Arc::new(InMemoryTalk {
            number: record.number,
            name: record.name.clone(),
            shared: Arc::clone(&self.shared),
        })
    }

    fn handles<'a>(&self, records: impl IntoIterator<Item = &'a TalkRecord>) -> Vec<TalkHandle> {
        records.into_iter().map(|record| self.handle(record)).collect()
    }
}

impl<C> Shared<C> {
    fn read(&self) -> TalkStoreResult<RwLockReadGuard<'_, InMemoryTalkState>> {
        self.state
            .read()
            .map_err(|err| TalkStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> TalkStoreResult<RwLockWriteGuard<'_, InMemoryTalkState>> {
        self.state
            .write()
            .map_err(|err| TalkStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

impl InMemoryTalkState {
    fn record(&self, number: TalkNumber, name: &TalkName) -> TalkStoreResult<&TalkRecord> {
        self.records
            .get(&number)
            .ok_or_else(|| TalkStoreError::NotFound(name.to_string()))
    }

    fn record_mut(&mut self, number: TalkNumber, name: &TalkName) -> TalkStoreResult<&mut TalkRecord> {
        self.records
            .get_mut(&number)
            .ok_or_else(|| TalkStoreError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl<C> Talks for InMemoryTalks<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn exists(&self, number: TalkNumber) -> TalkStoreResult<bool> {
        Ok(self.shared.read()?.records.contains_key(&number))
    }

    async fn exists_named(&self, name: &TalkName) -> TalkStoreResult<bool> {
        Ok(self.shared.read()?.names.contains_key(name))
    }

    async fn get(&self, number: TalkNumber) -> TalkStoreResult<TalkHandle> {
        let state = self.shared.read()?;
        let record = state
            .records
            .get(&number)
            .ok_or_else(|| TalkStoreError::NotFound(format!("#{number}")))?;
        Ok(self.handle(record))
    }

    async fn get_named(&self, name: &TalkName) -> TalkStoreResult<TalkHandle> {
        let state = self.shared.read()?;
        let record = state
            .names
            .get(name)
            .and_then(|number| state.records.get(number))
            .ok_or_else(|| TalkStoreError::NotFound(name.to_string()))?;
        Ok(self.handle(record))
    }

    async fn create(&self, repo: &RepoName, name: &TalkName) -> TalkStoreResult<TalkNumber> {
        let mut state = self.shared.write()?;
        if state.names.contains_key(name) {
            return Err(TalkStoreError::Duplicate(name.clone()));
        }
        state.last = state.last.saturating_add(1);
        let number = TalkNumber::new(state.last);
        let record = TalkRecord::new(number, name.clone(), repo.clone(), self.shared.clock.utc());
        state.names.insert(name.clone(), number);
        state.records.insert(number, record);
        Ok(number)
    }

    async fn delete(&self, name: &TalkName) -> TalkStoreResult<()> {
        let mut state = self.shared.write()?;
        let number = state
            .names
            .remove(name)
            .ok_or_else(|| TalkStoreError::NotFound(name.to_string()))?;
        state.records.remove(&number);
        Ok(())
    }

    async fn active(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        let state = self.shared.read()?;
        Ok(self.handles(active_of(state.records.values())))
    }

    async fn recent(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        let state = self.shared.read()?;
        let now = self.shared.clock.utc();
        Ok(self.handles(recent_of(state.records.values(), now, &self.shared.settings)))
    }

    async fn siblings(&self, repo: &RepoName, since: DateTime<Utc>) -> TalkStoreResult<Vec<TalkHandle>> {
        let state = self.shared.read()?;
        Ok(self.handles(siblings_of(state.records.values(), repo, since)))
    }
}

/// Handle onto one talk of an [`InMemoryTalks`] registry.
struct InMemoryTalk<C> {
    number: TalkNumber,
    name: TalkName,
    shared: Arc<Shared<C>>,
}

impl<C> fmt::Debug for InMemoryTalk<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTalk")
            .field("number", &self.number)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> Talk for InMemoryTalk<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn number(&self) -> TalkNumber {
        self.number
    }

    fn name(&self) -> &TalkName {
        &self.name
    }

    async fn read(&self) -> TalkStoreResult<Document> {
        let state = self.shared.read()?;
        Ok(state.record(self.number, &self.name)?.document.clone())
    }

    async fn modify(&self, patch: &Patch) -> TalkStoreResult<()> {
        let (next, expected) = {
            let state = self.shared.read()?;
            let record = state.record(self.number, &self.name)?;
            (prepare_write(record, patch, &self.shared.settings)?, record.version)
        };
        let Some(document) = next else {
            return Ok(());
        };
        let mut state = self.shared.write()?;
        let record = state.record_mut(self.number, &self.name)?;
        if record.version != expected {
            return Err(TalkStoreError::StaleWrite {
                name: self.name.clone(),
                expected,
                found: record.version,
            });
        }
        if !record.active {
            return Err(TalkStoreError::Inactive(self.name.clone()));
        }
        record.replace(document, self.shared.clock.utc());
        Ok(())
    }

    async fn updated(&self) -> TalkStoreResult<DateTime<Utc>> {
        let state = self.shared.read()?;
        Ok(state.record(self.number, &self.name)?.updated)
    }

    async fn is_active(&self) -> TalkStoreResult<bool> {
        let state = self.shared.read()?;
        Ok(state.record(self.number, &self.name)?.active)
    }

    async fn set_active(&self, active: bool) -> TalkStoreResult<()> {
        let mut state = self.shared.write()?;
        let now = self.shared.clock.utc();
        let record = state.record_mut(self.number, &self.name)?;
        if record.active != active {
            record.active = active;
            record.updated = now;
            record.version = record.version.saturating_add(1);
        }
        Ok(())
    }
}
