//! Shell port and conveniences built on it.

use super::error::{ShellError, ShellResult};
use crate::talk::domain::Document;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Runs commands somewhere and reports their exit codes.
#[async_trait]
pub trait Shell: Send + Sync + fmt::Debug {
    /// Runs `command`, feeding `stdin` and copying output into `stdout` and
    /// `stderr`. Returns the remote exit code.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError`] when the command could not be run to
    /// completion. A non-zero exit is not an error here.
    async fn exec(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ShellResult<i32>;
}

/// Shared shell handle.
pub type ShellHandle = Arc<dyn Shell>;

/// Builds shells from the `/talk/shell` record of a document.
pub trait ShellFactory: Send + Sync + fmt::Debug {
    /// Returns a shell for the document's environment.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError`] when the record is missing or malformed.
    fn shell(&self, document: &Document) -> ShellResult<ShellHandle>;
}

/// Fields of a `/talk/shell` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRecord {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Remote user.
    pub login: String,
    /// Private key text.
    pub key: String,
}

impl ShellRecord {
    /// Reads the record from a document.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::MissingRecord`] when the section or one of its
    /// fields is absent, or the port is not a number.
    pub fn from_document(document: &Document) -> ShellResult<Self> {
        let shell = document
            .section("shell")
            .ok_or_else(|| ShellError::MissingRecord("shell".to_owned()))?;
        let field = |name: &str| {
            shell
                .child_text(name)
                .map(str::to_owned)
                .ok_or_else(|| ShellError::MissingRecord(format!("shell/{name}")))
        };
        let port = field("port")?
            .trim()
            .parse()
            .map_err(|_| ShellError::MissingRecord("shell/port".to_owned()))?;
        Ok(Self {
            host: field("host")?,
            port,
            login: field("login")?,
            key: field("key")?,
        })
    }
}

/// Convenience forms of [`Shell::exec`].
#[async_trait]
pub trait ShellExt: Shell {
    /// Runs a command with empty stdin, capturing stdout as text.
    ///
    /// # Errors
    ///
    /// Propagates [`ShellError`] from the shell.
    async fn exec_plain(&self, command: &str) -> ShellResult<(i32, String)> {
        let mut stdin = tokio::io::empty();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = self.exec(command, &mut stdin, &mut stdout, &mut stderr).await?;
        if !stderr.is_empty() {
            tracing::debug!(command, stderr = %String::from_utf8_lossy(&stderr), "remote stderr");
        }
        Ok((code, String::from_utf8_lossy(&stdout).into_owned()))
    }

    /// Runs a command feeding `input` to its stdin, discarding output.
    ///
    /// # Errors
    ///
    /// Propagates [`ShellError`] from the shell.
    async fn exec_input(&self, command: &str, input: &[u8]) -> ShellResult<i32> {
        let mut stdin = input;
        let mut stdout = tokio::io::sink();
        let mut stderr = tokio::io::sink();
        self.exec(command, &mut stdin, &mut stdout, &mut stderr).await
    }

    /// Runs a command with no input, discarding output.
    ///
    /// # Errors
    ///
    /// Propagates [`ShellError`] from the shell.
    async fn exec_quiet(&self, command: &str) -> ShellResult<i32> {
        self.exec_input(command, &[]).await
    }
}

impl<S: Shell + ?Sized> ShellExt for S {}
