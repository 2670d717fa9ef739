//! Directory-backed talk store.
//!
//! Every talk lives in its own JSON file named after its number. Writes go to
//! a temporary file that is renamed over the old one, so readers always see a
//! complete record. A process-wide mutex serializes writers; the record
//! version catches writers that worked from an outdated snapshot. File work
//! runs on the blocking pool.

use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::settings::{StoreSettings, active_of, prepare_write, recent_of, siblings_of};
use crate::talk::{
    domain::{Document, Patch, RepoName, TalkName, TalkNumber, TalkRecord},
    ports::{Talk, TalkHandle, TalkStoreError, TalkStoreResult, Talks},
};

const SUFFIX: &str = ".json";

/// Talk registry persisted as one file per talk.
pub struct DirTalks<C> {
    shared: Arc<DirShared<C>>,
}

struct DirShared<C> {
    dir: Dir,
    index: Mutex<DirIndex>,
    clock: Arc<C>,
    settings: StoreSettings,
}

#[derive(Debug, Default)]
struct DirIndex {
    names: HashMap<TalkName, TalkNumber>,
    last: u64,
}

impl<C> Clone for DirTalks<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> fmt::Debug for DirTalks<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirTalks")
            .field("settings", &self.shared.settings)
            .finish_non_exhaustive()
    }
}

impl<C> DirTalks<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Opens (creating if needed) the store directory and indexes it.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::Persistence`] when the directory cannot be
    /// created or a record cannot be decoded.
    pub fn open(path: &Utf8Path, clock: Arc<C>, settings: StoreSettings) -> TalkStoreResult<Self> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| TalkStoreError::persistence(io::Error::other("store path must name a directory")))?;
        let base = Dir::open_ambient_dir(parent, ambient_authority()).map_err(TalkStoreError::persistence)?;
        base.create_dir_all(name).map_err(TalkStoreError::persistence)?;
        let dir = base.open_dir(name).map_err(TalkStoreError::persistence)?;
        Self::from_dir(dir, clock, settings)
    }

    /// Wraps an already opened directory and indexes it.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::Persistence`] when a record cannot be read.
    pub fn from_dir(dir: Dir, clock: Arc<C>, settings: StoreSettings) -> TalkStoreResult<Self> {
        let mut index = DirIndex::default();
        for record in load_all(&dir)? {
            index.last = index.last.max(record.number.value());
            index.names.insert(record.name, record.number);
        }
        tracing::debug!(talks = index.names.len(), "talk directory indexed");
        Ok(Self {
            shared: Arc::new(DirShared {
                dir,
                index: Mutex::new(index),
                clock,
                settings,
            }),
        })
    }

    fn handle(&self, (number, name): (TalkNumber, TalkName)) -> TalkHandle {
        Arc::new(DirTalk {
            number,
            name,
            shared: Arc::clone(&self.shared),
        })
    }

    fn handles(&self, found: Vec<(TalkNumber, TalkName)>) -> Vec<TalkHandle> {
        found.into_iter().map(|key| self.handle(key)).collect()
    }

    async fn run_blocking<F, T>(&self, f: F) -> TalkStoreResult<T>
    where
        F: FnOnce(&DirShared<C>) -> TalkStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(&self.shared, f).await
    }
}

/// Runs blocking directory work off the async executor.
async fn run_blocking<C, F, T>(shared: &Arc<DirShared<C>>, f: F) -> TalkStoreResult<T>
where
    C: Send + Sync + 'static,
    F: FnOnce(&DirShared<C>) -> TalkStoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let owned = Arc::clone(shared);
    tokio::task::spawn_blocking(move || f(&owned))
        .await
        .map_err(TalkStoreError::persistence)?
}

fn keys<'a>(records: impl IntoIterator<Item = &'a TalkRecord>) -> Vec<(TalkNumber, TalkName)> {
    records
        .into_iter()
        .map(|record| (record.number, record.name.clone()))
        .collect()
}

fn file_name(number: TalkNumber) -> String {
    format!("{:010}{SUFFIX}", number.value())
}

fn load_all(dir: &Dir) -> TalkStoreResult<Vec<TalkRecord>> {
    let mut records = Vec::new();
    for item in dir.entries().map_err(TalkStoreError::persistence)? {
        let entry = item.map_err(TalkStoreError::persistence)?;
        let name = entry.file_name().map_err(TalkStoreError::persistence)?;
        if !name.ends_with(SUFFIX) || name.starts_with('.') {
            continue;
        }
        let raw = dir.read_to_string(&name).map_err(TalkStoreError::persistence)?;
        records.push(serde_json::from_str(&raw).map_err(TalkStoreError::persistence)?);
    }
    Ok(records)
}

impl<C> DirShared<C> {
    fn lock(&self) -> TalkStoreResult<MutexGuard<'_, DirIndex>> {
        self.index
            .lock()
            .map_err(|err| TalkStoreError::persistence(io::Error::other(err.to_string())))
    }

    fn load(&self, number: TalkNumber, lookup: &dyn fmt::Display) -> TalkStoreResult<TalkRecord> {
        match self.dir.read_to_string(file_name(number)) {
            Ok(raw) => serde_json::from_str(&raw).map_err(TalkStoreError::persistence),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(TalkStoreError::NotFound(lookup.to_string())),
            Err(err) => Err(TalkStoreError::persistence(err)),
        }
    }

    fn store(&self, record: &TalkRecord) -> TalkStoreResult<()> {
        let encoded = serde_json::to_vec_pretty(record).map_err(TalkStoreError::persistence)?;
        let target = file_name(record.number);
        let staging = format!(".{target}.{}", uuid::Uuid::new_v4());
        self.dir.write(&staging, encoded).map_err(TalkStoreError::persistence)?;
        self.dir
            .rename(&staging, &self.dir, &target)
            .map_err(TalkStoreError::persistence)
    }
}

#[async_trait]
impl<C> Talks for DirTalks<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn exists(&self, number: TalkNumber) -> TalkStoreResult<bool> {
        self.run_blocking(move |shared| Ok(shared.dir.exists(file_name(number))))
            .await
    }

    async fn exists_named(&self, name: &TalkName) -> TalkStoreResult<bool> {
        let wanted = name.clone();
        self.run_blocking(move |shared| Ok(shared.lock()?.names.contains_key(&wanted)))
            .await
    }

    async fn get(&self, number: TalkNumber) -> TalkStoreResult<TalkHandle> {
        let record = self
            .run_blocking(move |shared| shared.load(number, &format_args!("#{number}")))
            .await?;
        Ok(self.handle((record.number, record.name)))
    }

    async fn get_named(&self, name: &TalkName) -> TalkStoreResult<TalkHandle> {
        let wanted = name.clone();
        let record = self
            .run_blocking(move |shared| {
                let number = shared
                    .lock()?
                    .names
                    .get(&wanted)
                    .copied()
                    .ok_or_else(|| TalkStoreError::NotFound(wanted.to_string()))?;
                shared.load(number, &wanted)
            })
            .await?;
        Ok(self.handle((record.number, record.name)))
    }

    async fn create(&self, repo: &RepoName, name: &TalkName) -> TalkStoreResult<TalkNumber> {
        let (repo_name, talk_name) = (repo.clone(), name.clone());
        let number = self
            .run_blocking(move |shared| {
                let mut index = shared.lock()?;
                if index.names.contains_key(&talk_name) {
                    return Err(TalkStoreError::Duplicate(talk_name));
                }
                let number = TalkNumber::new(index.last.saturating_add(1));
                let record = TalkRecord::new(number, talk_name.clone(), repo_name, shared.clock.utc());
                shared.store(&record)?;
                index.last = number.value();
                index.names.insert(talk_name, number);
                Ok(number)
            })
            .await?;
        tracing::info!(talk = %name, %number, "talk created");
        Ok(number)
    }

    async fn delete(&self, name: &TalkName) -> TalkStoreResult<()> {
        let doomed = name.clone();
        self.run_blocking(move |shared| {
            let mut index = shared.lock()?;
            let number = index
                .names
                .get(&doomed)
                .copied()
                .ok_or_else(|| TalkStoreError::NotFound(doomed.to_string()))?;
            shared
                .dir
                .remove_file(file_name(number))
                .map_err(TalkStoreError::persistence)?;
            index.names.remove(&doomed);
            Ok(())
        })
        .await
    }

    async fn active(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        let found = self
            .run_blocking(|shared| Ok(keys(active_of(load_all(&shared.dir)?.iter()))))
            .await?;
        Ok(self.handles(found))
    }

    async fn recent(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        let found = self
            .run_blocking(|shared| {
                let records = load_all(&shared.dir)?;
                let now = shared.clock.utc();
                Ok(keys(recent_of(records.iter(), now, &shared.settings)))
            })
            .await?;
        Ok(self.handles(found))
    }

    async fn siblings(&self, repo: &RepoName, since: DateTime<Utc>) -> TalkStoreResult<Vec<TalkHandle>> {
        let repo_name = repo.clone();
        let found = self
            .run_blocking(move |shared| Ok(keys(siblings_of(load_all(&shared.dir)?.iter(), &repo_name, since))))
            .await?;
        Ok(self.handles(found))
    }
}

/// Handle onto one talk of a [`DirTalks`] registry.
struct DirTalk<C> {
    number: TalkNumber,
    name: TalkName,
    shared: Arc<DirShared<C>>,
}

impl<C> fmt::Debug for DirTalk<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirTalk")
            .field("number", &self.number)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> Talk for DirTalk<C>
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
        let (number, name) = (self.number, self.name.clone());
        run_blocking(&self.shared, move |shared| Ok(shared.load(number, &name)?.document)).await
    }

    async fn modify(&self, patch: &Patch) -> TalkStoreResult<()> {
        let (number, name, patch) = (self.number, self.name.clone(), patch.clone());
        run_blocking(&self.shared, move |shared| {
            let snapshot = shared.load(number, &name)?;
            let Some(document) = prepare_write(&snapshot, &patch, &shared.settings)? else {
                return Ok(());
            };
            let _index = shared.lock()?;
            let mut current = shared.load(number, &name)?;
            if current.version != snapshot.version {
                return Err(TalkStoreError::StaleWrite {
                    name,
                    expected: snapshot.version,
                    found: current.version,
                });
            }
            if !current.active {
                return Err(TalkStoreError::Inactive(name));
            }
            current.replace(document, shared.clock.utc());
            shared.store(&current)
        })
        .await
    }

    async fn updated(&self) -> TalkStoreResult<DateTime<Utc>> {
        let (number, name) = (self.number, self.name.clone());
        run_blocking(&self.shared, move |shared| Ok(shared.load(number, &name)?.updated)).await
    }

    async fn is_active(&self) -> TalkStoreResult<bool> {
        let (number, name) = (self.number, self.name.clone());
        run_blocking(&self.shared, move |shared| Ok(shared.load(number, &name)?.active)).await
    }

    async fn set_active(&self, active: bool) -> TalkStoreResult<()> {
        let (number, name) = (self.number, self.name.clone());
        run_blocking(&self.shared, move |shared| {
            let _index = shared.lock()?;
            let mut record = shared.load(number, &name)?;
            if record.active == active {
                return Ok(());
            }
            record.active = active;
            record.updated = shared.clock.utc();
            record.version = record.version.saturating_add(1);
            shared.store(&record)
        })
        .await
    }
}
