//! Error types for talk documents, path queries and patches.

use thiserror::Error;

/// Errors returned while constructing talk identity values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TalkDomainError {
    /// The talk name is empty after trimming.
    #[error("talk name must not be empty")]
    EmptyTalkName,

    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// A node name is not a valid identifier.
    #[error("invalid node name '{0}'")]
    InvalidNodeName(String),
}

/// Error returned when a path query cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid path query '{query}' at offset {offset}: {reason}")]
pub struct PathError {
    /// The query text as given.
    pub query: String,
    /// Byte offset where parsing stopped.
    pub offset: usize,
    /// Human readable cause.
    pub reason: String,
}

/// Errors returned while applying a patch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    /// A `Strict` directive saw a different number of cursor nodes.
    #[error("directive #{index}: expected {expected} node(s) under cursor, found {found}")]
    StrictMismatch {
        /// Position of the failing directive.
        index: usize,
        /// Count required by the directive.
        expected: usize,
        /// Count actually under the cursor.
        found: usize,
    },

    /// `Up` was applied while the cursor held the root.
    #[error("directive #{index}: cannot move above the root")]
    AboveRoot {
        /// Position of the failing directive.
        index: usize,
    },

    /// `Remove` was applied while the cursor held the root.
    #[error("directive #{index}: the root node cannot be removed")]
    RemoveRoot {
        /// Position of the failing directive.
        index: usize,
    },

    /// A directive named an invalid node.
    #[error("directive #{index}: {source}")]
    InvalidName {
        /// Position of the failing directive.
        index: usize,
        /// Underlying validation failure.
        source: TalkDomainError,
    },
}
