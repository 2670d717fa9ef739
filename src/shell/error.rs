//! Error types for remote command execution.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for shell operations.
pub type ShellResult<T> = Result<T, ShellError>;

/// Errors raised while validating private key material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The key is empty after normalization.
    #[error("private key is empty")]
    Empty,

    /// The first line is not a `-----BEGIN ... PRIVATE KEY-----` header.
    #[error("private key must start with a BEGIN PRIVATE KEY header")]
    MissingHeader,

    /// The last line is not the footer matching the header.
    #[error("private key must end with '{expected}'")]
    MissingFooter {
        /// Footer required by the header.
        expected: String,
    },

    /// Only header and footer are present.
    #[error("private key has no body")]
    EmptyBody,
}

/// Errors raised by shells and the SSH primitive.
#[derive(Debug, Clone, Error)]
pub enum ShellError {
    /// The host did not resolve to an address.
    #[error("host '{0}' does not resolve to an IP address")]
    UnresolvedHost(String),

    /// The login is empty.
    #[error("SSH login must not be empty")]
    EmptyLogin,

    /// The key material is malformed.
    #[error("invalid private key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Every connection attempt failed.
    #[error("failed to connect to {target} after {attempts} attempt(s): {source}")]
    Connect {
        /// `login@host:port` of the target.
        target: String,
        /// Attempts made.
        attempts: u32,
        /// Last transport failure.
        source: Arc<io::Error>,
    },

    /// The session broke while the command was running.
    #[error("remote session failed: {0}")]
    Io(Arc<io::Error>),

    /// The command exited with a non-zero code under a strict shell.
    #[error("command exited with code {code}: {command}")]
    NonZeroExit {
        /// Exit code reported by the remote process.
        code: i32,
        /// Command that failed.
        command: String,
    },

    /// The completion wait exceeded its deadline.
    #[error("command did not finish within {0:?}")]
    TimedOut(Duration),

    /// The completion wait was cancelled.
    #[error("command wait was cancelled")]
    Cancelled,

    /// The document carries no usable shell record.
    #[error("talk has no usable '{0}' record")]
    MissingRecord(String),
}

impl From<io::Error> for ShellError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl ShellError {
    /// Returns `true` for failures caused by bad input rather than the
    /// network or the remote host.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedHost(_) | Self::EmptyLogin | Self::InvalidKey(_) | Self::MissingRecord(_)
        )
    }
}
