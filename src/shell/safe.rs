//! Shell wrapper that treats non-zero exits as failures.

use super::error::{ShellError, ShellResult};
use super::ports::{Shell, ShellHandle};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Fails with [`ShellError::NonZeroExit`] whenever the inner shell reports a
/// non-zero code.
#[derive(Debug, Clone)]
pub struct SafeShell {
    inner: ShellHandle,
}

impl SafeShell {
    /// Wraps a shell.
    #[must_use]
    pub const fn new(inner: ShellHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Shell for SafeShell {
    async fn exec(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ShellResult<i32> {
        match self.inner.exec(command, stdin, stdout, stderr).await? {
            0 => Ok(0),
            code => Err(ShellError::NonZeroExit {
                code,
                command: command.to_owned(),
            }),
        }
    }
}
