//! Work queue port.

use super::error::QueueResult;
use super::item::{Delivery, WorkItem};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Longest single wait inside a long-polling [`WorkQueue::pull`].
pub const PULL_SLICE: Duration = Duration::from_secs(5);

/// Shared handle to a work queue.
pub type WorkQueueHandle = Arc<dyn WorkQueue>;

/// At-least-once queue of work items.
///
/// A pulled item stays in flight until it is acknowledged or requeued.
#[async_trait]
pub trait WorkQueue: Send + Sync + fmt::Debug {
    /// Enqueues an item at the back.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`](super::QueueError) when the backend refuses the
    /// item.
    async fn push(&self, item: WorkItem) -> QueueResult<()>;

    /// Takes the next item, waiting up to `timeout` for one to arrive.
    ///
    /// Waiting happens in slices of at most [`PULL_SLICE`]; `None` means the
    /// timeout elapsed with the queue empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`](super::QueueError) on backend failure.
    async fn pull(&self, timeout: Duration) -> QueueResult<Option<Delivery>>;

    /// Removes a delivered item for good.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownReceipt`](super::QueueError::UnknownReceipt)
    /// when the delivery is not in flight.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Puts a delivered item back at the end of the queue.
    ///
    /// The item is not handed out again before `delay` has passed; items
    /// behind it that are already due are delivered first.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownReceipt`](super::QueueError::UnknownReceipt)
    /// when the delivery is not in flight.
    async fn requeue(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()>;
}
