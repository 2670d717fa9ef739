//! Provisioning failures.

use crate::shell::ShellError;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for provisioners.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors raised while acquiring or releasing environments.
#[derive(Debug, Clone, Error)]
pub enum ProvisionError {
    /// A shell used to drive the provider failed.
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// A provider command exited with a non-zero code.
    #[error("'{command}' exited with code {code}: {output}")]
    Command {
        /// Command line that failed.
        command: String,
        /// Exit code.
        code: i32,
        /// Captured output.
        output: String,
    },

    /// Provider output could not be understood.
    #[error("unexpected provider output: {0}")]
    UnexpectedOutput(String),

    /// The environment never accepted connections.
    #[error("{host}:{port} did not accept connections after {attempts} attempt(s)")]
    Unreachable {
        /// Host that was probed.
        host: String,
        /// Port that was probed.
        port: u16,
        /// Probes made.
        attempts: u32,
    },

    /// The environment record is incomplete.
    #[error("environment record is incomplete: missing {0}")]
    Incomplete(String),

    /// The cloud provider API failed.
    #[error("provider API failed: {0}")]
    Api(Arc<dyn StdError + Send + Sync>),
}

impl ProvisionError {
    /// Wraps a provider API failure.
    pub fn api<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Api(Arc::new(err))
    }
}
