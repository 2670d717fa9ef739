//! Agent and engine failures.

use crate::notify::NotifyError;
use crate::provision::ProvisionError;
use crate::shell::ShellError;
use crate::talk::domain::{PatchError, PathError};
use crate::talk::ports::TalkStoreError;
use thiserror::Error;

/// Errors raised by a single agent while processing a document.
///
/// Apart from [`AgentError::Store`], these are recorded in the talk and only
/// skip the failing agent for the current pass.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// Remote execution failed.
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Acquiring or releasing an environment failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The talk store failed; aborts the whole run.
    #[error(transparent)]
    Store(#[from] TalkStoreError),

    /// The agent's patch does not apply to the document.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// A precondition query is malformed.
    #[error(transparent)]
    Query(#[from] PathError),

    /// A request script could not be rendered.
    #[error("cannot render script for '{command}': {reason}")]
    Template {
        /// Request type whose template failed.
        command: String,
        /// Renderer message.
        reason: String,
    },

    /// The document lacks data the agent's preconditions promised.
    #[error("malformed talk: {0}")]
    Malformed(String),

    /// The request asks for something nobody implements.
    #[error("'{0}' is not implemented")]
    NotImplemented(String),

    /// A notification could not be delivered.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Errors that abort an engine run.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Reading or writing the talk failed.
    #[error(transparent)]
    Store(#[from] TalkStoreError),
}

impl EngineError {
    /// Returns `true` when retrying the run later may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        match self {
            Self::Store(err) => err.is_conflict(),
        }
    }
}
