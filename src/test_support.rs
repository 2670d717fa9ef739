//! Helpers shared by unit tests.

use crate::shell::{Shell, ShellError, ShellFactory, ShellHandle, ShellRecord, ShellResult};
use crate::talk::domain::Document;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts the clock at 2024-03-01 12:00 UTC.
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid start instant");
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// A shell that answers commands from a rule table and records what it ran.
#[derive(Debug, Default)]
pub struct ScriptedShell {
    rules: Mutex<Vec<(String, i32, String)>>,
    failure: Mutex<Option<ShellError>>,
    log: Mutex<Vec<(String, String)>>,
}

impl ScriptedShell {
    /// Answers `(0, "")` to everything until told otherwise.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Commands containing `needle` exit with `code` and print `stdout`.
    /// Later rules win over earlier ones.
    pub fn on(&self, needle: &str, code: i32, stdout: &str) {
        self.rules
            .lock()
            .expect("rules lock")
            .push((needle.to_owned(), code, stdout.to_owned()));
    }

    /// Makes every later command fail with `error`.
    pub fn fail_with(&self, error: ShellError) {
        *self.failure.lock().expect("failure lock") = Some(error);
    }

    /// Commands run so far.
    pub fn commands(&self) -> Vec<String> {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    /// Stdin fed to the first command containing `needle`.
    pub fn input_of(&self, needle: &str) -> Option<String> {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .find(|(command, _)| command.contains(needle))
            .map(|(_, input)| input.clone())
    }
}

#[async_trait]
impl Shell for ScriptedShell {
    async fn exec(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        _stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ShellResult<i32> {
        let mut input = String::new();
        stdin.read_to_string(&mut input).await?;
        self.log
            .lock()
            .expect("log lock")
            .push((command.to_owned(), input));
        if let Some(error) = self.failure.lock().expect("failure lock").clone() {
            return Err(error);
        }
        let answer = self
            .rules
            .lock()
            .expect("rules lock")
            .iter()
            .rev()
            .find(|(needle, _, _)| command.contains(needle.as_str()))
            .map(|(_, code, out)| (*code, out.clone()));
        let (code, out) = answer.unwrap_or((0, String::new()));
        stdout.write_all(out.as_bytes()).await?;
        Ok(code)
    }
}

/// Hands out the same shell for every document.
#[derive(Debug)]
pub struct FixedShellFactory {
    pub shell: Arc<ScriptedShell>,
}

impl ShellFactory for FixedShellFactory {
    fn shell(&self, document: &Document) -> ShellResult<ShellHandle> {
        ShellRecord::from_document(document)?;
        Ok(Arc::clone(&self.shell) as ShellHandle)
    }
}
