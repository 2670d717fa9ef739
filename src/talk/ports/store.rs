//! Store port for talks and their documents.

use crate::talk::domain::{Document, Patch, PatchError, RepoName, TalkName, TalkNumber};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for talk store operations.
pub type TalkStoreResult<T> = Result<T, TalkStoreError>;

/// Shared handle to a stored talk.
pub type TalkHandle = Arc<dyn Talk>;

/// One stored talk.
///
/// Identity is fixed at construction; everything else is read from the
/// backing store on demand.
#[async_trait]
pub trait Talk: Send + Sync + fmt::Debug {
    /// Returns the store-assigned number.
    fn number(&self) -> TalkNumber;

    /// Returns the unique name.
    fn name(&self) -> &TalkName;

    /// Returns a snapshot of the current document.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::NotFound`] when the talk was deleted or
    /// [`TalkStoreError::Persistence`] on backend failure.
    async fn read(&self) -> TalkStoreResult<Document>;

    /// Applies a patch atomically and bumps the update timestamp.
    ///
    /// A patch that leaves the document unchanged is accepted without a
    /// write.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::StaleWrite`] when another writer got in
    /// first, [`TalkStoreError::Inactive`] for a terminal talk,
    /// [`TalkStoreError::Patch`] when the patch does not apply, and
    /// [`TalkStoreError::TooLarge`] when the result exceeds the store limit.
    async fn modify(&self, patch: &Patch) -> TalkStoreResult<()>;

    /// Returns the time of the last accepted write.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::NotFound`] or
    /// [`TalkStoreError::Persistence`].
    async fn updated(&self) -> TalkStoreResult<DateTime<Utc>>;

    /// Returns `false` once the talk is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::NotFound`] or
    /// [`TalkStoreError::Persistence`].
    async fn is_active(&self) -> TalkStoreResult<bool>;

    /// Flips the lifecycle flag. Setting the current value again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::NotFound`] or
    /// [`TalkStoreError::Persistence`].
    async fn set_active(&self, active: bool) -> TalkStoreResult<()>;
}

/// Registry of all talks.
#[async_trait]
pub trait Talks: Send + Sync {
    /// Returns `true` when a talk with this number exists.
    async fn exists(&self, number: TalkNumber) -> TalkStoreResult<bool>;

    /// Returns `true` when a talk with this name exists.
    async fn exists_named(&self, name: &TalkName) -> TalkStoreResult<bool>;

    /// Looks a talk up by number.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::NotFound`] when no talk has this number.
    async fn get(&self, number: TalkNumber) -> TalkStoreResult<TalkHandle>;

    /// Looks a talk up by name.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::NotFound`] when no talk has this name.
    async fn get_named(&self, name: &TalkName) -> TalkStoreResult<TalkHandle>;

    /// Creates an active talk with an initial document.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::Duplicate`] when the name is taken.
    async fn create(&self, repo: &RepoName, name: &TalkName) -> TalkStoreResult<TalkNumber>;

    /// Deletes a talk.
    ///
    /// # Errors
    ///
    /// Returns [`TalkStoreError::NotFound`] when no talk has this name.
    async fn delete(&self, name: &TalkName) -> TalkStoreResult<()>;

    /// Returns every non-terminal talk, ascending by number.
    async fn active(&self) -> TalkStoreResult<Vec<TalkHandle>>;

    /// Returns recently finished talks, newest first, bounded in count and
    /// age.
    async fn recent(&self) -> TalkStoreResult<Vec<TalkHandle>>;

    /// Returns talks of a repository updated after `since`, newest first.
    async fn siblings(&self, repo: &RepoName, since: DateTime<Utc>) -> TalkStoreResult<Vec<TalkHandle>>;
}

/// Errors returned by talk store implementations.
#[derive(Debug, Clone, Error)]
pub enum TalkStoreError {
    /// No talk matches the lookup.
    #[error("talk not found: {0}")]
    NotFound(String),

    /// A talk with this name already exists.
    #[error("duplicate talk name: {0}")]
    Duplicate(TalkName),

    /// The document changed between snapshot and write.
    #[error("stale write to talk {name}: expected version {expected}, found {found}")]
    StaleWrite {
        /// Talk being written.
        name: TalkName,
        /// Version the patch was applied to.
        expected: u64,
        /// Version found at write time.
        found: u64,
    },

    /// The talk is terminal and read-only.
    #[error("talk {0} is inactive")]
    Inactive(TalkName),

    /// The patch did not apply to the current document.
    #[error("patch rejected for talk {name}: {source}")]
    Patch {
        /// Talk being written.
        name: TalkName,
        /// Underlying patch failure.
        source: PatchError,
    },

    /// The resulting document exceeds the store limit.
    #[error("document of talk {name} is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Talk being written.
        name: TalkName,
        /// Encoded size of the rejected document.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TalkStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns `true` for conflicts that a later retry may resolve.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::StaleWrite { .. })
    }
}
