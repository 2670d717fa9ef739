//! Production [`ShellFactory`] connecting over SSH.

use super::error::ShellResult;
use super::ports::{ShellFactory, ShellHandle, ShellRecord};
use super::ssh::{RetryPolicy, Ssh};
use super::transport::Transport;
use crate::talk::domain::Document;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builds [`Ssh`] shells from `/talk/shell` records.
#[derive(Clone)]
pub struct SshFactory {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    poll: Duration,
    deadline: Option<Duration>,
}

impl SshFactory {
    /// Uses `transport` with the default retry policy and a 1 s poll.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            poll: Duration::from_secs(1),
            deadline: None,
        }
    }

    /// Replaces the retry policy of every shell built.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the polling interval of every shell built.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Bounds every command run by the shells built.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

impl fmt::Debug for SshFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshFactory")
            .field("retry", &self.retry)
            .field("poll", &self.poll)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl ShellFactory for SshFactory {
    fn shell(&self, document: &Document) -> ShellResult<ShellHandle> {
        let record = ShellRecord::from_document(document)?;
        let mut ssh = Ssh::new(
            &record.host,
            record.port,
            &record.login,
            &record.key,
            Arc::clone(&self.transport),
        )?
        .with_retry(self.retry)
        .with_poll_interval(self.poll);
        if let Some(deadline) = self.deadline {
            ssh = ssh.with_deadline(deadline);
        }
        Ok(Arc::new(ssh))
    }
}
