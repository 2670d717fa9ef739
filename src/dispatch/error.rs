//! Queue and dispatcher errors.

use crate::agent::EngineError;
use crate::talk::ports::TalkStoreError;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Result type for work queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors returned by work queue implementations.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The receipt does not name an in-flight delivery.
    #[error("unknown delivery receipt {0}")]
    UnknownReceipt(Uuid),

    /// The queue no longer accepts work.
    #[error("work queue is closed")]
    Closed,

    /// Backend failure.
    #[error("work queue backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueueError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}

/// Errors surfaced by the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Pulling, acking or requeueing failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The talk registry failed outside of a work item.
    #[error(transparent)]
    Store(#[from] TalkStoreError),

    /// An engine run failed outside of a work item.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A worker task panicked or was aborted.
    #[error("dispatcher worker failed: {0}")]
    Worker(String),
}
