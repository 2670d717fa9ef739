//! Transport port used by the SSH primitive.
//!
//! A [`Transport`] opens [`Session`]s; a session opens one [`Channel`] per
//! command. Keeping these behind traits lets the completion loop, retry
//! policy and cleanup be exercised against scripted transports.

use super::key::PrivateKey;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::IpAddr;
use tokio::io::{AsyncRead, AsyncWrite};

/// Severity floor for diagnostics emitted by the transport itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportLogLevel {
    /// Client errors, forwarded as warnings.
    Warn,
    /// Fatal client errors only.
    Error,
}

/// Session options applied on every connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Never prompt for passwords or passphrases.
    pub batch_mode: bool,
    /// Refuse unknown host keys instead of accepting them.
    pub strict_host_keys: bool,
    /// Lowest severity forwarded to the log.
    pub log_level: TransportLogLevel,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            batch_mode: true,
            strict_host_keys: false,
            log_level: TransportLogLevel::Warn,
        }
    }
}

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// Resolved host address.
    pub addr: IpAddr,
    /// TCP port.
    pub port: u16,
    /// Remote user.
    pub login: String,
    /// Authentication key.
    pub key: PrivateKey,
}

impl fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.login, self.addr, self.port)
    }
}

/// The three byte streams of a running command.
pub struct ChannelIo {
    /// Remote stdin.
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    /// Remote stdout.
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    /// Remote stderr.
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
}

/// Opens authenticated sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes one session.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the host cannot be reached or refuses the
    /// credentials.
    async fn connect(&self, target: &SshTarget, options: &TransportOptions) -> io::Result<Box<dyn Session>>;
}

/// A live authenticated session.
#[async_trait]
pub trait Session: Send {
    /// Starts a command and returns its channel.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the channel cannot be opened.
    async fn open(&mut self, command: &str) -> io::Result<Box<dyn Channel>>;

    /// Closes the session.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the close handshake fails.
    async fn disconnect(&mut self) -> io::Result<()>;
}

/// One running command.
#[async_trait]
pub trait Channel: Send {
    /// Hands out the command's streams; subsequent calls return `None`.
    fn take_io(&mut self) -> Option<ChannelIo>;

    /// Returns `true` once the remote command has finished.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the channel state cannot be queried.
    async fn is_closed(&mut self) -> io::Result<bool>;

    /// Returns the exit status once the channel is closed.
    fn exit_status(&self) -> Option<i32>;

    /// Tears the channel down, stopping the command if it still runs.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the channel cannot be closed.
    async fn disconnect(&mut self) -> io::Result<()>;
}
