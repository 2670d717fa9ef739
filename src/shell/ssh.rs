//! The SSH command-execution primitive.
//!
//! [`Ssh`] connects through a [`Transport`] with bounded retry, runs one
//! command per session, pumps the three streams, then polls the channel until
//! it closes and reports the remote exit status. Channel and session are
//! always disconnected, whatever the outcome.

use super::error::{ShellError, ShellResult};
use super::key::PrivateKey;
use super::ports::Shell;
use super::transport::{Channel, ChannelIo, Session, SshTarget, Transport, TransportOptions};
use async_trait::async_trait;
use std::fmt;
use std::future::{self, Future};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// How often and how far apart connection attempts are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(15),
        }
    }
}

/// A remote shell reached over SSH.
#[derive(Clone)]
pub struct Ssh {
    host: String,
    port: u16,
    login: String,
    key: PrivateKey,
    options: TransportOptions,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    poll: Duration,
    deadline: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl Ssh {
    /// Validates the connection parameters. Host names are looked up when a
    /// command runs.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::UnresolvedHost`] for a blank host,
    /// [`ShellError::EmptyLogin`] for a blank login and
    /// [`ShellError::InvalidKey`] for malformed key text.
    pub fn new(
        host: &str,
        port: u16,
        login: &str,
        key: &str,
        transport: Arc<dyn Transport>,
    ) -> ShellResult<Self> {
        let name = host.trim();
        if name.is_empty() {
            return Err(ShellError::UnresolvedHost(host.to_owned()));
        }
        let user = login.trim();
        if user.is_empty() {
            return Err(ShellError::EmptyLogin);
        }
        let parsed = PrivateKey::parse(key)?;
        Ok(Self {
            host: name.to_owned(),
            port,
            login: user.to_owned(),
            key: parsed,
            options: TransportOptions::default(),
            transport,
            retry: RetryPolicy::default(),
            poll: Duration::from_secs(1),
            deadline: None,
            cancel: None,
        })
    }

    /// Replaces the connection retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the channel polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Limits how long a command may run once its channel is open.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Aborts the wait when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolves the host, preferring an IPv4 address.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::UnresolvedHost`] when the host yields no address.
    pub async fn target(&self) -> ShellResult<SshTarget> {
        Ok(SshTarget {
            addr: resolve(&self.host, self.port).await?,
            port: self.port,
            login: self.login.clone(),
            key: self.key.clone(),
        })
    }

    async fn connect(&self, target: &SshTarget) -> ShellResult<Box<dyn Session>> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match self.transport.connect(target, &self.options).await {
                Ok(session) => return Ok(session),
                Err(err) if attempt < attempts => {
                    tracing::warn!(
                        target = %target,
                        attempt,
                        error = %err,
                        "SSH connection failed, retrying in {:?}",
                        self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    return Err(ShellError::Connect {
                        target: target.to_string(),
                        attempts: attempt,
                        source: Arc::new(err),
                    });
                }
            }
        }
    }

    async fn run(
        &self,
        target: &SshTarget,
        session: &mut dyn Session,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ShellResult<i32> {
        let mut channel = session.open(command).await?;
        let outcome = self.drive(channel.as_mut(), stdin, stdout, stderr).await;
        if let Err(err) = channel.disconnect().await {
            tracing::warn!(target = %target, error = %err, "failed to close SSH channel");
        }
        outcome
    }

    async fn drive(
        &self,
        channel: &mut dyn Channel,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ShellResult<i32> {
        let ChannelIo {
            stdin: mut remote_in,
            stdout: mut remote_out,
            stderr: mut remote_err,
        } = channel
            .take_io()
            .ok_or_else(|| ShellError::from(io::Error::other("channel streams were already taken")))?;
        let feed = async {
            tolerate_broken_pipe(tokio::io::copy(stdin, &mut remote_in).await.map(drop))?;
            tolerate_broken_pipe(remote_in.shutdown().await)
        };
        let work = async {
            tokio::try_join!(
                feed,
                tokio::io::copy(&mut remote_out, stdout),
                tokio::io::copy(&mut remote_err, stderr),
            )?;
            stdout.flush().await?;
            stderr.flush().await?;
            self.wait_closed(channel).await
        };
        self.guarded(work).await
    }

    async fn wait_closed(&self, channel: &mut dyn Channel) -> ShellResult<i32> {
        let mut ticks = tokio::time::interval(self.poll);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            if channel.is_closed().await? {
                break;
            }
        }
        channel
            .exit_status()
            .ok_or_else(|| ShellError::from(io::Error::other("channel closed without an exit status")))
    }

    async fn guarded(&self, work: impl Future<Output = ShellResult<i32>> + Send) -> ShellResult<i32> {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => future::pending().await,
            }
        };
        tokio::select! {
            outcome = work => outcome,
            () = cancelled => Err(ShellError::Cancelled),
            limit = expired => Err(ShellError::TimedOut(limit)),
        }
    }
}

fn tolerate_broken_pipe(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

async fn resolve(host: &str, port: u16) -> ShellResult<IpAddr> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr);
    }
    let unresolved = || ShellError::UnresolvedHost(host.to_owned());
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| unresolved())?
        .map(|addr| addr.ip())
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(unresolved)
}

impl fmt::Debug for Ssh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ssh")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("retry", &self.retry)
            .field("poll", &self.poll)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Shell for Ssh {
    async fn exec(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ShellResult<i32> {
        let target = self.target().await?;
        let mut session = self.connect(&target).await?;
        let outcome = self.run(&target, session.as_mut(), command, stdin, stdout, stderr).await;
        if let Err(err) = session.disconnect().await {
            tracing::warn!(target = %target, error = %err, "failed to close SSH session");
        }
        match &outcome {
            Ok(code) => tracing::debug!(target = %target, command, code, "remote command finished"),
            Err(err) => tracing::warn!(target = %target, command, error = %err, "remote command failed"),
        }
        outcome
    }
}
