//! [`Transport`] backed by the system OpenSSH client.
//!
//! Each session is a ControlMaster connection living in a private temporary
//! directory next to its key file; each channel is one `ssh -S` client
//! multiplexed over that master.

use super::transport::{Channel, ChannelIo, Session, SshTarget, Transport, TransportLogLevel, TransportOptions};
use async_trait::async_trait;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::{Child, Command};

/// Production transport spawning `ssh` processes.
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    program: PathBuf,
}

impl Default for OpenSshTransport {
    fn default() -> Self {
        Self::new("ssh")
    }
}

impl OpenSshTransport {
    /// Uses the given client binary.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn client_options(options: &TransportOptions) -> Vec<String> {
    let mut args = vec![
        "-o".to_owned(),
        format!("BatchMode={}", if options.batch_mode { "yes" } else { "no" }),
        "-o".to_owned(),
        format!(
            "StrictHostKeyChecking={}",
            if options.strict_host_keys { "yes" } else { "no" }
        ),
    ];
    if !options.strict_host_keys {
        args.extend(["-o".to_owned(), "UserKnownHostsFile=/dev/null".to_owned()]);
    }
    let level = match options.log_level {
        TransportLogLevel::Warn => "ERROR",
        TransportLogLevel::Error => "FATAL",
    };
    args.extend(["-o".to_owned(), format!("LogLevel={level}")]);
    args
}

async fn forward_log(path: PathBuf) {
    let read = tokio::task::spawn_blocking(move || std::fs::read_to_string(path))
        .await
        .unwrap_or_else(|err| Err(io::Error::from(err)));
    match read {
        Ok(log) => {
            for line in log.lines().filter(|line| !line.trim().is_empty()) {
                tracing::warn!(target: "palaver::ssh", "{line}");
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => tracing::debug!(error = %err, "cannot read ssh client log"),
    }
}

/// Creates the private directory holding the key file and control socket.
fn key_workdir(contents: &str) -> io::Result<(TempDir, NamedTempFile)> {
    let workdir = tempfile::Builder::new().prefix("palaver-ssh-").tempdir()?;
    let mut key = NamedTempFile::new_in(workdir.path())?;
    key.write_all(contents.as_bytes())?;
    key.flush()?;
    Ok((workdir, key))
}

#[async_trait]
impl Transport for OpenSshTransport {
    async fn connect(&self, target: &SshTarget, options: &TransportOptions) -> io::Result<Box<dyn Session>> {
        let contents = target.key.to_file_contents();
        let (workdir, key) = tokio::task::spawn_blocking(move || key_workdir(&contents)).await??;
        let socket = workdir.path().join("control");
        let log = workdir.path().join("master.log");
        let destination = format!("{}@{}", target.login, target.addr);
        let status = Command::new(&self.program)
            .args(client_options(options))
            .arg("-M")
            .arg("-S")
            .arg(&socket)
            .arg("-N")
            .arg("-f")
            .arg("-E")
            .arg(&log)
            .arg("-i")
            .arg(key.path())
            .arg("-p")
            .arg(target.port.to_string())
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        forward_log(log).await;
        if !status.success() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("ssh master to {target} exited with {status}"),
            ));
        }
        tracing::debug!(%target, "SSH master connection established");
        Ok(Box::new(OpenSshSession {
            program: self.program.clone(),
            options: *options,
            socket,
            destination,
            port: target.port,
            _key: key,
            _workdir: workdir,
        }))
    }
}

struct OpenSshSession {
    program: PathBuf,
    options: TransportOptions,
    socket: PathBuf,
    destination: String,
    port: u16,
    // Dropped after the fields above, which reference files inside.
    _key: NamedTempFile,
    _workdir: TempDir,
}

impl OpenSshSession {
    fn client(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(client_options(&self.options))
            .arg("-S")
            .arg(&self.socket)
            .arg("-p")
            .arg(self.port.to_string());
        command
    }
}

#[async_trait]
impl Session for OpenSshSession {
    async fn open(&mut self, command: &str) -> io::Result<Box<dyn Channel>> {
        let mut child = self
            .client()
            .arg(&self.destination)
            .arg("--")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let missing = || io::Error::other("ssh client streams are not piped");
        let io = ChannelIo {
            stdin: Box::new(child.stdin.take().ok_or_else(missing)?),
            stdout: Box::new(child.stdout.take().ok_or_else(missing)?),
            stderr: Box::new(child.stderr.take().ok_or_else(missing)?),
        };
        Ok(Box::new(OpenSshChannel {
            child,
            io: Some(io),
            status: None,
        }))
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        let status = self
            .client()
            .arg("-O")
            .arg("exit")
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("ssh -O exit returned {status}")))
        }
    }
}

struct OpenSshChannel {
    child: Child,
    io: Option<ChannelIo>,
    status: Option<i32>,
}

/// Code reported when the client died without one, as `ssh` itself does.
const CLIENT_FAILURE: i32 = 255;

#[async_trait]
impl Channel for OpenSshChannel {
    fn take_io(&mut self) -> Option<ChannelIo> {
        self.io.take()
    }

    async fn is_closed(&mut self) -> io::Result<bool> {
        if self.status.is_some() {
            return Ok(true);
        }
        Ok(match self.child.try_wait()? {
            Some(status) => {
                self.status = Some(status.code().unwrap_or(CLIENT_FAILURE));
                true
            }
            None => false,
        })
    }

    fn exit_status(&self) -> Option<i32> {
        self.status
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        if self.status.is_none() {
            if let Err(err) = self.child.start_kill()
                && err.kind() != io::ErrorKind::InvalidInput
            {
                return Err(err);
            }
            let status = self.child.wait().await?;
            self.status = Some(status.code().unwrap_or(CLIENT_FAILURE));
        }
        self.io = None;
        Ok(())
    }
}
