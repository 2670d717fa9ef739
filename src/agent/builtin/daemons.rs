//! Agents that run request scripts as detached daemons on a remote shell.
//!
//! A daemon lives in its own directory on the remote host: `run.sh` is the
//! script, `pid` its process id, `stdout` the combined output and `status`
//! the exit code written once it finishes.

use super::{Timestamps, field, parse_time, section};
use crate::agent::error::AgentError;
use crate::agent::ports::{Agent, preconditions};
use crate::shell::{SafeShell, ShellExt, ShellFactory, shell_escape};
use crate::talk::domain::{Document, Patch, PathError, PathQuery};
use async_trait::async_trait;
use chrono::TimeDelta;
use std::sync::Arc;

/// Output lines carrying this prefix are copied into `highlights`.
pub const HIGHLIGHT_PREFIX: &str = "PALAVER: ";

/// Lines of output kept in `tail`.
const TAIL_LINES: usize = 60;

/// Characters of output kept in `tail`.
const TAIL_CHARS: usize = 10_000;

/// Bytes of `stdout` fetched from the remote host.
const STDOUT_LIMIT: u64 = 4_000_000;

/// Exit code recorded when the daemon could not be started.
const START_FAILURE: i32 = 128;

const SHELL_READY: &str = "/talk/shell[host and port and login and key]";

/// Where daemons run and how long they may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Remote directory under which daemon directories are created.
    pub workdir: String,
    /// Runtime after which a daemon is stopped.
    pub max_runtime: TimeDelta,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            workdir: "/tmp".to_owned(),
            max_runtime: TimeDelta::hours(2),
        }
    }
}

fn daemon_query() -> Result<PathQuery, PathError> {
    PathQuery::parse("/talk/daemon")
}

/// Uploads the daemon script and launches it in the background.
#[derive(Debug)]
pub struct StartsDaemon {
    shells: Arc<dyn ShellFactory>,
    time: Timestamps,
    settings: DaemonSettings,
    queries: Vec<PathQuery>,
    daemon: PathQuery,
}

impl StartsDaemon {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in query fails to parse.
    pub fn new(shells: Arc<dyn ShellFactory>, time: Timestamps, settings: DaemonSettings) -> Result<Self, PathError> {
        Ok(Self {
            shells,
            time,
            settings,
            queries: preconditions(&[SHELL_READY, "/talk/daemon[script and not(started) and not(ended)]"])?,
            daemon: daemon_query()?,
        })
    }

    async fn launch(&self, document: &Document, dir: &str, script: &str) -> Result<(), AgentError> {
        let shell = SafeShell::new(self.shells.shell(document)?);
        let quoted = shell_escape(dir);
        let body = [
            "#!/bin/bash",
            "set -x",
            "set -e",
            "set -o pipefail",
            "cd \"$(dirname \"$0\")\"",
            "echo $$ > pid",
            "date",
            "uptime",
            script,
            "",
        ]
        .join("\n");
        shell
            .exec_input(&format!("mkdir -p {quoted} && cd {quoted} && cat > run.sh"), body.as_bytes())
            .await?;
        shell
            .exec_quiet(&format!(
                "cd {quoted} && chmod a+x run.sh && echo 'run.sh failed to start' > stdout && \
                 ( ( nohup ./run.sh </dev/null >stdout 2>&1; echo $? >status ) </dev/null >/dev/null 2>&1 & )"
            ))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Agent for StartsDaemon {
    fn name(&self) -> &'static str {
        "starts-daemon"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let daemon = section(document, "daemon")?;
        let id = daemon
            .attribute("id")
            .ok_or_else(|| AgentError::Malformed("daemon has no id".to_owned()))?;
        let script = field(daemon, "script")?;
        let dir = format!("{}/palaver-{id}", self.settings.workdir.trim_end_matches('/'));
        let started = self.time.iso();
        let patch = Patch::new()
            .xpath(&self.daemon)
            .strict(1)
            .add("started")
            .set(started)
            .up()
            .add("dir")
            .set(dir.as_str())
            .up();
        match self.launch(document, &dir, script).await {
            Ok(()) => {
                tracing::info!(talk = ?document.talk_name(), dir, "daemon started");
                Ok(patch)
            }
            Err(AgentError::Shell(err)) if !err.is_malformed() => {
                tracing::warn!(talk = ?document.talk_name(), error = %err, "daemon failed to start");
                Ok(patch
                    .add("ended")
                    .set(self.time.iso())
                    .up()
                    .add("code")
                    .set(START_FAILURE.to_string())
                    .up()
                    .add("tail")
                    .set(err.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}

/// Stops a running daemon that was cancelled or ran too long.
#[derive(Debug)]
pub struct StopsDaemon {
    shells: Arc<dyn ShellFactory>,
    time: Timestamps,
    max_runtime: TimeDelta,
    queries: Vec<PathQuery>,
    daemon: PathQuery,
}

impl StopsDaemon {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in query fails to parse.
    pub fn new(shells: Arc<dyn ShellFactory>, time: Timestamps, max_runtime: TimeDelta) -> Result<Self, PathError> {
        Ok(Self {
            shells,
            time,
            max_runtime,
            queries: preconditions(&["/talk/daemon[started and dir and not(ended) and not(stopped)]", SHELL_READY])?,
            daemon: daemon_query()?,
        })
    }

    fn reason(&self, document: &Document) -> Option<&'static str> {
        let cancelled = document
            .section("request")
            .is_some_and(|request| request.has_child("cancel"));
        if cancelled {
            return Some("cancel");
        }
        let started = document
            .section("daemon")
            .and_then(|daemon| daemon.child_text("started"))
            .and_then(parse_time)?;
        (self.time.now().signed_duration_since(started) > self.max_runtime).then_some("timeout")
    }
}

#[async_trait]
impl Agent for StopsDaemon {
    fn name(&self) -> &'static str {
        "stops-daemon"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let Some(reason) = self.reason(document) else {
            return Ok(Patch::new());
        };
        let dir = field(section(document, "daemon")?, "dir")?;
        let shell = self.shells.shell(document)?;
        shell
            .exec_quiet(&format!(
                "cd {} && if [ -e pid ]; then pid=$(cat pid); pkill -TERM -P \"$pid\"; kill -TERM \"$pid\"; fi; true",
                shell_escape(dir)
            ))
            .await?;
        tracing::info!(talk = ?document.talk_name(), dir, reason, "daemon stopped");
        Ok(Patch::new()
            .xpath(&self.daemon)
            .strict(1)
            .add("stopped")
            .attr("reason", reason)
            .set(self.time.iso()))
    }
}

/// Collects the exit code and output of a finished daemon.
#[derive(Debug)]
pub struct EndsDaemon {
    shells: Arc<dyn ShellFactory>,
    time: Timestamps,
    queries: Vec<PathQuery>,
    daemon: PathQuery,
}

impl EndsDaemon {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in query fails to parse.
    pub fn new(shells: Arc<dyn ShellFactory>, time: Timestamps) -> Result<Self, PathError> {
        Ok(Self {
            shells,
            time,
            queries: preconditions(&["/talk/daemon[started and dir and not(code) and not(ended)]", SHELL_READY])?,
            daemon: daemon_query()?,
        })
    }
}

#[async_trait]
impl Agent for EndsDaemon {
    fn name(&self) -> &'static str {
        "ends-daemon"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let dir = shell_escape(field(section(document, "daemon")?, "dir")?);
        let shell = self.shells.shell(document)?;
        let running = shell
            .exec_quiet(&format!("cd {dir} && [ -e pid ] && kill -0 \"$(cat pid)\" 2>/dev/null"))
            .await?;
        if running == 0 {
            tracing::debug!(talk = ?document.talk_name(), "daemon still running");
            return Ok(Patch::new());
        }
        let (_, status) = shell
            .exec_plain(&format!("cd {dir}; if [ ! -e status ]; then echo 127; exit; fi; cat status"))
            .await?;
        let code = exit_code(&status);
        let (_, stdout) = shell
            .exec_plain(&format!(
                "cd {dir}; size=$(stat -c%s stdout); if [ \"$size\" -gt {STDOUT_LIMIT} ]; \
                 then echo \"Output is too big ($size bytes)\"; echo \"You see only the last {STDOUT_LIMIT} bytes\"; \
                 tail -c {STDOUT_LIMIT} stdout; else cat stdout; fi"
            ))
            .await?;
        tracing::info!(talk = ?document.talk_name(), code, "daemon finished");
        Ok(Patch::new()
            .xpath(&self.daemon)
            .strict(1)
            .add("ended")
            .set(self.time.iso())
            .up()
            .add("code")
            .set(code.to_string())
            .up()
            .add("highlights")
            .set(highlights(&stdout))
            .up()
            .add("tail")
            .set(tail(&stdout)))
    }
}

/// Reads an exit code from `status` file contents; garbage counts as 1.
fn exit_code(status: &str) -> i32 {
    let digits: String = status.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(1)
}

/// Lines flagged with [`HIGHLIGHT_PREFIX`], prefix removed.
pub(crate) fn highlights(output: &str) -> String {
    output
        .lines()
        .filter_map(|line| line.strip_prefix(HIGHLIGHT_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The last lines of output, bounded in characters.
pub(crate) fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let skip = lines.len().saturating_sub(TAIL_LINES);
    let kept = lines.get(skip..).unwrap_or_default().join("\n");
    kept.chars().take(TAIL_CHARS).collect()
}
