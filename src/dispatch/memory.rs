//! In-process work queue.

use super::error::{QueueError, QueueResult};
use super::item::{Delivery, WorkItem};
use super::queue::{PULL_SLICE, WorkQueue};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{self, Instant};
use uuid::Uuid;

/// Work queue held in memory; nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryWorkQueue {
    state: Mutex<QueueState>,
    arrivals: Notify,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Pending>,
    in_flight: HashMap<Uuid, Delivery>,
}

#[derive(Debug)]
struct Pending {
    item: WorkItem,
    attempts: u32,
    due: Instant,
}

/// Result of looking for a deliverable item.
enum Next {
    Ready(Delivery),
    /// Nothing is due; the earliest delayed item becomes due at this instant.
    Waiting(Option<Instant>),
}

impl InMemoryWorkQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items waiting to be pulled.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Items pulled but neither acknowledged nor requeued.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    async fn enqueue(&self, item: WorkItem, attempts: u32, due: Instant) {
        self.state.lock().await.pending.push_back(Pending { item, attempts, due });
        self.arrivals.notify_one();
    }

    async fn take(&self) -> Next {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let Some(position) = state.pending.iter().position(|pending| pending.due <= now) else {
            return Next::Waiting(state.pending.iter().map(|pending| pending.due).min());
        };
        let Some(pending) = state.pending.remove(position) else {
            return Next::Waiting(None);
        };
        let delivery = Delivery::new(pending.item, pending.attempts.saturating_add(1));
        state.in_flight.insert(delivery.receipt(), delivery.clone());
        Next::Ready(delivery)
    }

    async fn settle(&self, delivery: &Delivery) -> QueueResult<Delivery> {
        self.state
            .lock()
            .await
            .in_flight
            .remove(&delivery.receipt())
            .ok_or(QueueError::UnknownReceipt(delivery.receipt()))
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn push(&self, item: WorkItem) -> QueueResult<()> {
        tracing::debug!(item = %item.id, talk = %item.talk, command = %item.command, "work item queued");
        self.enqueue(item, 0, Instant::now()).await;
        Ok(())
    }

    async fn pull(&self, timeout: Duration) -> QueueResult<Option<Delivery>> {
        let deadline = Instant::now() + timeout;
        loop {
            let due = match self.take().await {
                Next::Ready(delivery) => return Ok(Some(delivery)),
                Next::Waiting(due) => due,
            };
            let now = Instant::now();
            let remaining = deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                return Ok(None);
            }
            let slice = due.map_or(PULL_SLICE, |due| due.saturating_duration_since(now).min(PULL_SLICE));
            if time::timeout(remaining.min(slice), self.arrivals.notified())
                .await
                .is_err()
            {
                tracing::trace!(?remaining, "no work item due yet");
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.settle(delivery).await?;
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()> {
        let settled = self.settle(delivery).await?;
        let attempts = settled.attempt();
        self.enqueue(settled.item().clone(), attempts, Instant::now() + delay).await;
        Ok(())
    }
}
