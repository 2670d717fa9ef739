//! Coherence and memoization tests for the caching decorator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::cache::{CacheSettings, CachedTalks};
use crate::talk::{
    adapters::InMemoryTalks,
    domain::{Document, Patch, PathQuery, RepoName, TalkName, TalkNumber},
    ports::{Talk, TalkHandle, TalkStoreResult, Talks},
};
use crate::test_support::ManualClock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rstest::{fixture, rstest};

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicUsize,
    gets: AtomicUsize,
    lists: AtomicUsize,
}

struct CountingTalks {
    inner: InMemoryTalks<ManualClock>,
    counters: Arc<Counters>,
}

#[derive(Debug)]
struct CountingTalk {
    inner: TalkHandle,
    counters: Arc<Counters>,
}

impl CountingTalks {
    fn wrap(&self, inner: TalkHandle) -> TalkHandle {
        Arc::new(CountingTalk {
            inner,
            counters: Arc::clone(&self.counters),
        })
    }
}

#[async_trait]
impl Talk for CountingTalk {
    fn number(&self) -> TalkNumber {
        self.inner.number()
    }

    fn name(&self) -> &TalkName {
        self.inner.name()
    }

    async fn read(&self) -> TalkStoreResult<Document> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read().await
    }

    async fn modify(&self, patch: &Patch) -> TalkStoreResult<()> {
        self.inner.modify(patch).await
    }

    async fn updated(&self) -> TalkStoreResult<DateTime<Utc>> {
        self.inner.updated().await
    }

    async fn is_active(&self) -> TalkStoreResult<bool> {
        self.inner.is_active().await
    }

    async fn set_active(&self, active: bool) -> TalkStoreResult<()> {
        self.inner.set_active(active).await
    }
}

#[async_trait]
impl Talks for CountingTalks {
    async fn exists(&self, number: TalkNumber) -> TalkStoreResult<bool> {
        self.inner.exists(number).await
    }

    async fn exists_named(&self, name: &TalkName) -> TalkStoreResult<bool> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.exists_named(name).await
    }

    async fn get(&self, number: TalkNumber) -> TalkStoreResult<TalkHandle> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.wrap(self.inner.get(number).await?))
    }

    async fn get_named(&self, name: &TalkName) -> TalkStoreResult<TalkHandle> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.wrap(self.inner.get_named(name).await?))
    }

    async fn create(&self, repo: &RepoName, name: &TalkName) -> TalkStoreResult<TalkNumber> {
        self.inner.create(repo, name).await
    }

    async fn delete(&self, name: &TalkName) -> TalkStoreResult<()> {
        self.inner.delete(name).await
    }

    async fn active(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.active().await?.into_iter().map(|talk| self.wrap(talk)).collect())
    }

    async fn recent(&self) -> TalkStoreResult<Vec<TalkHandle>> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.recent().await?.into_iter().map(|talk| self.wrap(talk)).collect())
    }

    async fn siblings(&self, repo: &RepoName, since: DateTime<Utc>) -> TalkStoreResult<Vec<TalkHandle>> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .inner
            .siblings(repo, since)
            .await?
            .into_iter()
            .map(|talk| self.wrap(talk))
            .collect())
    }
}

struct Harness {
    counters: Arc<Counters>,
    cached: CachedTalks<CountingTalks>,
}

#[fixture]
fn harness() -> Harness {
    let counters = Arc::new(Counters::default());
    let backing = CountingTalks {
        inner: InMemoryTalks::new(Arc::new(ManualClock::new())),
        counters: Arc::clone(&counters),
    };
    let settings = CacheSettings {
        capacity: 100,
        recent_ttl: Duration::from_millis(50),
    };
    Harness {
        counters,
        cached: CachedTalks::with_settings(Arc::new(backing), settings),
    }
}

fn repo() -> RepoName {
    RepoName::new("acme/widgets").expect("valid repo")
}

fn name(raw: &str) -> TalkName {
    TalkName::new(raw).expect("valid name")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_reads_hit_the_backing_store_once(harness: Harness) {
    harness.cached.create(&repo(), &name("a")).await.expect("create");
    let talk = harness.cached.get_named(&name("a")).await.expect("get");

    for _ in 0..5 {
        talk.read().await.expect("read");
    }

    assert_eq!(harness.counters.reads.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn modify_then_read_reflects_the_patch(harness: Harness) {
    harness.cached.create(&repo(), &name("a")).await.expect("create");
    let talk = harness.cached.get_named(&name("a")).await.expect("get");
    let marker = PathQuery::parse("/talk/marker[@step='2']").expect("query");

    for step in 1..=3 {
        talk.read().await.expect("warm cache");
        talk.modify(&Patch::new().add_if("marker").attr("step", step.to_string()))
            .await
            .expect("modify");
        let document = talk.read().await.expect("read");
        assert_eq!(document.matches(&marker), step == 2, "after step {step}");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handles_are_shared_across_lookups(harness: Harness) {
    harness.cached.create(&repo(), &name("a")).await.expect("create");
    let first = harness.cached.get_named(&name("a")).await.expect("get");
    let second = harness.cached.get_named(&name("a")).await.expect("get");
    first.read().await.expect("read");
    second.read().await.expect("read");

    assert_eq!(harness.counters.gets.load(Ordering::SeqCst), 1);
    assert_eq!(harness.counters.reads.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn negative_existence_is_not_remembered(harness: Harness) {
    assert!(!harness.cached.exists_named(&name("a")).await.expect("exists"));
    harness.cached.create(&repo(), &name("a")).await.expect("create");

    assert!(harness.cached.exists_named(&name("a")).await.expect("exists"));
    assert!(harness.cached.exists_named(&name("a")).await.expect("exists"));
    assert_eq!(harness.counters.gets.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_flip_refreshes_active_listing(harness: Harness) {
    harness.cached.create(&repo(), &name("a")).await.expect("create");
    harness.cached.create(&repo(), &name("b")).await.expect("create");
    assert_eq!(harness.cached.active().await.expect("active").len(), 2);
    assert_eq!(harness.cached.active().await.expect("active").len(), 2);
    assert_eq!(harness.counters.lists.load(Ordering::SeqCst), 1);

    let talk = harness.cached.get_named(&name("a")).await.expect("get");
    assert!(talk.is_active().await.expect("flag"));
    talk.set_active(false).await.expect("deactivate");

    assert!(!talk.is_active().await.expect("flag"));
    let names: Vec<_> = harness
        .cached
        .active()
        .await
        .expect("active")
        .iter()
        .map(|talk| talk.name().to_string())
        .collect();
    assert_eq!(names, vec!["b"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn other_talks_keep_their_entries(harness: Harness) {
    harness.cached.create(&repo(), &name("a")).await.expect("create");
    harness.cached.create(&repo(), &name("b")).await.expect("create");
    let a = harness.cached.get_named(&name("a")).await.expect("get");
    let b = harness.cached.get_named(&name("b")).await.expect("get");
    a.read().await.expect("read");
    b.read().await.expect("read");

    a.modify(&Patch::new().add("x")).await.expect("modify");
    b.read().await.expect("read");

    assert_eq!(harness.counters.reads.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn recent_listing_expires(harness: Harness) {
    harness.cached.recent().await.expect("recent");
    harness.cached.recent().await.expect("recent");
    assert_eq!(harness.counters.lists.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(120)).await;
    harness.cached.recent().await.expect("recent");

    assert_eq!(harness.counters.lists.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_talks_are_not_served_from_cache(harness: Harness) {
    let number = harness.cached.create(&repo(), &name("a")).await.expect("create");
    harness.cached.get(number).await.expect("get");
    assert!(harness.cached.exists(number).await.expect("exists"));

    harness.cached.delete(&name("a")).await.expect("delete");

    assert!(!harness.cached.exists(number).await.expect("exists"));
    assert!(harness.cached.get(number).await.is_err());
}
