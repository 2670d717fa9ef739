//! Units of work and their deliveries.

use crate::talk::domain::{RepoName, TalkName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Command that cancels the talk's current request instead of starting one.
pub const STOP_COMMAND: &str = "stop";

/// One request to advance a talk: who asked, for what, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique id; becomes the request id in the talk.
    pub id: Uuid,
    /// Identity of the requester.
    pub owner: String,
    /// Repository the talk belongs to.
    pub repo: RepoName,
    /// Talk to advance, created on first sight.
    pub talk: TalkName,
    /// Command such as `merge`, `deploy`, `release` or `stop`.
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    /// When the item was scheduled.
    pub scheduled: DateTime<Utc>,
}

impl WorkItem {
    /// Creates an item with a fresh id and no arguments.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repo: RepoName,
        talk: TalkName,
        command: impl Into<String>,
        scheduled: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            repo,
            talk,
            command: command.into(),
            args: BTreeMap::new(),
            scheduled,
        }
    }

    /// Adds a command argument.
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Returns `true` for a cancellation request.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.command == STOP_COMMAND
    }
}

/// A pulled item, in flight until acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    receipt: Uuid,
    item: WorkItem,
    attempt: u32,
}

impl Delivery {
    /// Wraps an item handed out for the `attempt`-th time.
    #[must_use]
    pub fn new(item: WorkItem, attempt: u32) -> Self {
        Self {
            receipt: Uuid::new_v4(),
            item,
            attempt,
        }
    }

    /// Receipt to acknowledge.
    #[must_use]
    pub const fn receipt(&self) -> Uuid {
        self.receipt
    }

    /// The delivered item.
    #[must_use]
    pub const fn item(&self) -> &WorkItem {
        &self.item
    }

    /// How many times this item has been handed out, starting at 1.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}
