//! The worker pool that moves work items into talks.

use super::error::DispatchError;
use super::item::{Delivery, WorkItem};
use super::locks::TalkLocks;
use super::queue::WorkQueueHandle;
use crate::agent::{AgentEngine, EngineError, EngineReport};
use crate::talk::domain::{Document, Patch};
use crate::talk::ports::{TalkHandle, TalkStoreError, Talks};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Pool size and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Concurrent workers pulling from the queue.
    pub workers: usize,
    /// How long one pull waits for an item.
    pub pull_timeout: Duration,
    /// Period of the active-talk sweep.
    pub sweep_interval: Duration,
    /// Active talks advanced per sweep.
    pub max_talks_per_sweep: usize,
    /// How long a busy or failed item waits before it is handed out again.
    pub retry_delay: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            pull_timeout: Duration::from_secs(20),
            sweep_interval: Duration::from_secs(60),
            max_talks_per_sweep: 16,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Why an item went back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Another worker holds the talk.
    Busy,
    /// A concurrent write won; the item is retried at once against fresh
    /// state.
    Stale,
    /// The store failed.
    Store,
}

/// What became of one delivered item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The item reached its talk and the engine ran.
    Advanced(EngineReport),
    /// The item is back in the queue.
    Requeued(Requeue),
    /// The item was acknowledged without effect.
    Dropped,
}

/// Pulls work items and advances the talks they name.
pub struct Dispatcher {
    queue: WorkQueueHandle,
    talks: Arc<dyn Talks>,
    engine: Arc<AgentEngine>,
    locks: TalkLocks,
    settings: DispatcherSettings,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queue", &self.queue)
            .field("engine", &self.engine)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Wires a dispatcher with its own marker table.
    #[must_use]
    pub fn new(
        queue: WorkQueueHandle,
        talks: Arc<dyn Talks>,
        engine: Arc<AgentEngine>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            queue,
            talks,
            engine,
            locks: TalkLocks::new(),
            settings,
        }
    }

    /// Shares an existing marker table, for several dispatchers over one store.
    #[must_use]
    pub fn with_locks(mut self, locks: TalkLocks) -> Self {
        self.locks = locks;
        self
    }

    /// The marker table in use.
    #[must_use]
    pub const fn locks(&self) -> &TalkLocks {
        &self.locks
    }

    /// Pulls one item and processes it.
    ///
    /// Returns `None` when the pull timed out on an empty queue.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Queue`] when the queue fails. Store and
    /// engine failures requeue the item instead.
    pub async fn process_next(&self) -> Result<Option<Disposition>, DispatchError> {
        match self.queue.pull(self.settings.pull_timeout).await? {
            Some(delivery) => self.process(&delivery).await.map(Some),
            None => Ok(None),
        }
    }

    /// Processes one delivered item, settling it with the queue.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Queue`] when the item cannot be acknowledged
    /// or requeued.
    pub async fn process(&self, delivery: &Delivery) -> Result<Disposition, DispatchError> {
        let item = delivery.item();
        let Some(_lock) = self.locks.try_acquire(&item.talk) else {
            tracing::debug!(talk = %item.talk, item = %item.id, "talk busy, item requeued");
            return self.requeue(delivery, Requeue::Busy).await;
        };
        match self.advance(item).await {
            Ok(Some(report)) => {
                self.queue.ack(delivery).await?;
                tracing::info!(
                    talk = %item.talk,
                    item = %item.id,
                    outcome = ?report.outcome,
                    fired = report.fired.len(),
                    "work item processed"
                );
                Ok(Disposition::Advanced(report))
            }
            Ok(None) => {
                self.queue.ack(delivery).await?;
                Ok(Disposition::Dropped)
            }
            Err(err) => {
                let reason = if err.is_conflict() { Requeue::Stale } else { Requeue::Store };
                tracing::warn!(
                    talk = %item.talk,
                    item = %item.id,
                    attempt = delivery.attempt(),
                    error = %err,
                    "work item requeued"
                );
                self.requeue(delivery, reason).await
            }
        }
    }

    async fn requeue(&self, delivery: &Delivery, reason: Requeue) -> Result<Disposition, DispatchError> {
        let delay = match reason {
            Requeue::Stale => Duration::ZERO,
            Requeue::Busy | Requeue::Store => self.settings.retry_delay,
        };
        self.queue.requeue(delivery, delay).await?;
        Ok(Disposition::Requeued(reason))
    }

    /// Folds the item into its talk and runs the engine; `None` drops it.
    async fn advance(&self, item: &WorkItem) -> Result<Option<EngineReport>, EngineError> {
        let Some(talk) = self.resolve(item).await? else {
            return Ok(None);
        };
        if !talk.is_active().await? {
            tracing::warn!(talk = %item.talk, item = %item.id, "talk is inactive, item dropped");
            return Ok(None);
        }
        let document = talk.read().await?;
        let Some(patch) = seed(&document, item) else {
            return Ok(None);
        };
        talk.modify(&patch).await?;
        self.engine.run(talk.as_ref()).await.map(Some)
    }

    /// Finds the talk `item` addresses, opening it for anything but a stop.
    async fn resolve(&self, item: &WorkItem) -> Result<Option<TalkHandle>, TalkStoreError> {
        if !self.talks.exists_named(&item.talk).await? {
            if item.is_stop() {
                tracing::info!(talk = %item.talk, item = %item.id, "no such talk, nothing to stop");
                return Ok(None);
            }
            match self.talks.create(&item.repo, &item.talk).await {
                Ok(number) => tracing::info!(talk = %item.talk, %number, repo = %item.repo, "talk opened"),
                Err(TalkStoreError::Duplicate(_)) => {}
                Err(err) => return Err(err),
            }
        }
        self.talks.get_named(&item.talk).await.map(Some)
    }

    /// Advances up to `max_talks_per_sweep` active talks not held by a worker.
    ///
    /// Returns how many talks were run. Failures of single talks are logged
    /// and do not stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] when the active talks cannot be
    /// listed.
    pub async fn sweep(&self) -> Result<usize, DispatchError> {
        let active = self.talks.active().await?;
        let mut advanced = 0_usize;
        for talk in active.into_iter().take(self.settings.max_talks_per_sweep) {
            let Some(_lock) = self.locks.try_acquire(talk.name()) else {
                continue;
            };
            match self.engine.run(talk.as_ref()).await {
                Ok(report) => {
                    advanced = advanced.saturating_add(1);
                    tracing::debug!(talk = %talk.name(), outcome = ?report.outcome, "talk swept");
                }
                Err(err) => tracing::warn!(talk = %talk.name(), error = %err, "sweep failed for talk"),
            }
        }
        Ok(advanced)
    }

    /// Runs the worker pool and the sweep until `shutdown` fires.
    ///
    /// Workers check for shutdown between items, never in the middle of one.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Worker`] when a worker task panicked.
    pub async fn run(self: Arc<Self>, shutdown: &CancellationToken) -> Result<(), DispatchError> {
        let mut tasks = JoinSet::new();
        for worker in 0..self.settings.workers.max(1) {
            let dispatcher = Arc::clone(&self);
            let token = shutdown.clone();
            tasks.spawn(async move { dispatcher.work(worker, &token).await });
        }
        let sweeper = Arc::clone(&self);
        let token = shutdown.clone();
        tasks.spawn(async move { sweeper.sweep_periodically(&token).await });
        tracing::info!(workers = self.settings.workers.max(1), "dispatcher started");
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "dispatcher task failed");
                shutdown.cancel();
                failure.get_or_insert_with(|| DispatchError::Worker(err.to_string()));
            }
        }
        tracing::info!("dispatcher stopped");
        failure.map_or(Ok(()), Err)
    }

    async fn work(&self, worker: usize, shutdown: &CancellationToken) {
        loop {
            let pulled = tokio::select! {
                () = shutdown.cancelled() => break,
                pulled = self.queue.pull(self.settings.pull_timeout) => pulled,
            };
            let outcome = match pulled {
                Ok(Some(delivery)) => self.process(&delivery).await.map(Some),
                Ok(None) => Ok(None),
                Err(err) => Err(DispatchError::from(err)),
            };
            if let Err(err) = outcome {
                tracing::error!(worker, error = %err, "worker failed to settle an item");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = time::sleep(self.settings.pull_timeout.min(super::PULL_SLICE)) => {}
                }
            }
        }
        tracing::debug!(worker, "worker stopped");
    }

    async fn sweep_periodically(&self, shutdown: &CancellationToken) {
        let mut ticks = time::interval(self.settings.sweep_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticks.tick() => {}
            }
            match self.sweep().await {
                Ok(advanced) => tracing::debug!(advanced, "sweep finished"),
                Err(err) => tracing::warn!(error = %err, "sweep failed"),
            }
        }
    }
}

/// Builds the patch that records `item` in the talk, or `None` when the item
/// has nothing left to do.
fn seed(document: &Document, item: &WorkItem) -> Option<Patch> {
    let request = document.section("request");
    if item.is_stop() {
        let Some(current) = request else {
            tracing::info!(talk = %item.talk, "nothing to stop");
            return None;
        };
        if current.has_child("cancel") || current.has_child("success") {
            return None;
        }
        return Some(Patch::new().add_if("request").add("cancel").set(item.owner.as_str()));
    }
    let id = item.id.to_string();
    if let Some(current) = request {
        if current.attribute("id") == Some(id.as_str()) {
            tracing::debug!(talk = %item.talk, item = %item.id, "request already recorded");
            return Some(Patch::new());
        }
        tracing::warn!(
            talk = %item.talk,
            item = %item.id,
            current = current.attribute("id").unwrap_or_default(),
            "talk already carries a request, item dropped"
        );
        return None;
    }
    let mut patch = Patch::new()
        .add("request")
        .attr("id", id)
        .add("type")
        .set(item.command.as_str())
        .up()
        .add("author")
        .set(item.owner.as_str())
        .up()
        .add("scheduled")
        .set(item.scheduled.to_rfc3339())
        .up()
        .add("args");
    for (name, value) in &item.args {
        patch = patch.add("arg").attr("name", name.as_str()).set(value.as_str()).up();
    }
    Some(patch)
}
