//! Remote command execution.
//!
//! The [`Shell`] port runs one command and reports its exit code. [`Ssh`] is
//! the production implementation: it connects through a pluggable
//! [`Transport`] with bounded retry and polls the channel until the remote
//! process finishes. [`OpenSshTransport`] drives the system `ssh` client.

mod error;
mod escape;
mod factory;
mod key;
mod openssh;
mod ports;
mod safe;
mod ssh;
mod transport;

#[cfg(test)]
mod tests;

pub use error::{KeyError, ShellError, ShellResult};
pub use escape::{command_line, shell_escape, shell_word};
pub use factory::SshFactory;
pub use key::{PrivateKey, normalize};
pub use openssh::OpenSshTransport;
pub use ports::{Shell, ShellExt, ShellFactory, ShellHandle, ShellRecord};
pub use safe::SafeShell;
pub use ssh::{DEFAULT_PORT, RetryPolicy, Ssh};
pub use transport::{Channel, ChannelIo, Session, SshTarget, Transport, TransportLogLevel, TransportOptions};
