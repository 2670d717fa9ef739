//! Work intake: queue, per-talk markers and the worker pool.
//!
//! A [`Dispatcher`] pulls [`WorkItem`]s off a [`WorkQueue`], resolves or
//! creates the talk each one names, folds the item into the talk document and
//! hands the talk to the [`AgentEngine`](crate::agent::AgentEngine). A
//! [`TalkLocks`] marker guarantees that one talk is advanced by at most one
//! worker at a time.

mod dispatcher;
mod error;
mod item;
mod locks;
mod memory;
mod queue;

#[cfg(test)]
mod tests;

pub use dispatcher::{Disposition, Dispatcher, DispatcherSettings, Requeue};
pub use error::{DispatchError, QueueError, QueueResult};
pub use item::{Delivery, STOP_COMMAND, WorkItem};
pub use locks::{TalkLock, TalkLocks};
pub use memory::InMemoryWorkQueue;
pub use queue::{PULL_SLICE, WorkQueue, WorkQueueHandle};
