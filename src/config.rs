//! Daemon configuration.
//!
//! Read from a TOML file in which every section and every key is optional:
//!
//! ```toml
//! [store]
//! dir = "/var/lib/palaver/talks"
//!
//! [shell]
//! host = "build.example.com"
//! login = "palaver"
//! key_file = "/etc/palaver/id_rsa"
//!
//! [templates]
//! deploy = "make deploy"
//! ```

use crate::agent::EngineSettings;
use crate::agent::builtin::DaemonSettings;
use crate::cache::CacheSettings;
use crate::dispatch::DispatcherSettings;
use crate::shell::RetryPolicy;
use crate::talk::adapters::StoreSettings;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use chrono::TimeDelta;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying failure.
        source: Arc<io::Error>,
    },

    /// The TOML is malformed or has keys of the wrong type.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn read(path: &Utf8Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_owned(),
            source: Arc::new(source),
        }
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Talk store location and limits.
    pub store: StoreConfig,
    /// Read cache sizing.
    pub cache: CacheConfig,
    /// Agent engine limits.
    pub engine: EngineConfig,
    /// SSH client behaviour.
    pub ssh: SshConfig,
    /// Worker pool.
    pub dispatcher: DispatcherConfig,
    /// The build host handed to every talk.
    pub shell: ShellConfig,
    /// Script templates by command, overriding the built-in ones.
    pub templates: BTreeMap<String, String>,
    /// Remote daemon placement.
    pub daemon: DaemonConfig,
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, and
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`] for bad content.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        Self::from_toml(&read_file(path)?)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh.attempts == 0 {
            return Err(ConfigError::Invalid("ssh.attempts must be at least 1".to_owned()));
        }
        if self.shell.port == 0 {
            return Err(ConfigError::Invalid("shell.port must not be 0".to_owned()));
        }
        if self.shell.host.trim().is_empty() {
            return Err(ConfigError::Invalid("shell.host must not be empty".to_owned()));
        }
        if self.dispatcher.workers == 0 {
            return Err(ConfigError::Invalid("dispatcher.workers must be at least 1".to_owned()));
        }
        if self.dispatcher.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.sweep_interval_secs must be at least 1".to_owned(),
            ));
        }
        if self.engine.max_passes == Some(0) {
            return Err(ConfigError::Invalid("engine.max_passes must be at least 1".to_owned()));
        }
        Ok(())
    }
}

/// Reads a UTF-8 file through a capability on its parent directory.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] naming `path` when the read fails.
pub fn read_file(path: &Utf8Path) -> Result<String, ConfigError> {
    let name = path
        .file_name()
        .ok_or_else(|| ConfigError::Invalid(format!("{path} does not name a file")))?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| ConfigError::read(path, err))?;
    dir.read_to_string(name).map_err(|err| ConfigError::read(path, err))
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding one JSON file per talk.
    pub dir: Utf8PathBuf,
    /// Largest accepted document, in bytes.
    pub max_document_bytes: usize,
    /// Most talks listed as recent.
    pub recent_limit: usize,
    /// Age in hours past which a talk is no longer recent.
    pub recent_window_hours: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let settings = StoreSettings::default();
        Self {
            dir: Utf8PathBuf::from("talks"),
            max_document_bytes: settings.max_document_bytes,
            recent_limit: settings.recent_limit,
            recent_window_hours: 7 * 24,
        }
    }
}

impl StoreConfig {
    /// Store tunables.
    #[must_use]
    pub fn settings(&self) -> StoreSettings {
        StoreSettings {
            max_document_bytes: self.max_document_bytes,
            recent_limit: self.recent_limit,
            recent_window: TimeDelta::hours(i64::from(self.recent_window_hours)),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Most entries per cache table.
    pub capacity: u64,
    /// Seconds the `recent` listing is memoized.
    pub recent_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let settings = CacheSettings::default();
        Self {
            capacity: settings.capacity,
            recent_ttl_secs: settings.recent_ttl.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Cache tunables.
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        CacheSettings {
            capacity: self.capacity,
            recent_ttl: Duration::from_secs(self.recent_ttl_secs),
        }
    }
}

/// `[engine]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Pass limit per run; three per agent when unset.
    pub max_passes: Option<usize>,
}

impl EngineConfig {
    /// Engine tunables.
    #[must_use]
    pub const fn settings(&self) -> EngineSettings {
        EngineSettings {
            max_passes: self.max_passes,
        }
    }
}

/// `[ssh]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshConfig {
    /// The `ssh` client binary.
    pub program: Utf8PathBuf,
    /// Connection attempts, including the first.
    pub attempts: u32,
    /// Seconds between connection attempts.
    pub retry_delay_secs: u64,
    /// Seconds between channel-closed checks.
    pub poll_interval_secs: u64,
    /// Hard limit in seconds on one remote command; unlimited when unset.
    pub deadline_secs: Option<u64>,
}

impl Default for SshConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            program: Utf8PathBuf::from("ssh"),
            attempts: retry.attempts,
            retry_delay_secs: retry.delay.as_secs(),
            poll_interval_secs: 1,
            deadline_secs: None,
        }
    }
}

impl SshConfig {
    /// Connection retry policy.
    #[must_use]
    pub const fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    /// Interval between channel-closed checks.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Optional per-command deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// `[dispatcher]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Concurrent workers.
    pub workers: usize,
    /// Seconds one queue pull waits.
    pub pull_timeout_secs: u64,
    /// Seconds between sweeps of active talks.
    pub sweep_interval_secs: u64,
    /// Active talks advanced per sweep.
    pub max_talks_per_sweep: usize,
    /// Milliseconds a busy or failed item waits before it is retried.
    pub retry_delay_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let settings = DispatcherSettings::default();
        Self {
            workers: settings.workers,
            pull_timeout_secs: settings.pull_timeout.as_secs(),
            sweep_interval_secs: settings.sweep_interval.as_secs(),
            max_talks_per_sweep: settings.max_talks_per_sweep,
            retry_delay_ms: u64::try_from(settings.retry_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl DispatcherConfig {
    /// Worker pool tunables.
    #[must_use]
    pub const fn settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            workers: self.workers,
            pull_timeout: Duration::from_secs(self.pull_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_talks_per_sweep: self.max_talks_per_sweep,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// `[shell]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Build host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login name.
    pub login: String,
    /// PEM private key file; the key text is read at start-up.
    pub key_file: Option<Utf8PathBuf>,
    /// Keep the host when talks finish.
    pub immortal: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 22,
            login: "palaver".to_owned(),
            key_file: None,
            immortal: false,
        }
    }
}

impl ShellConfig {
    /// Reads the private key, or returns an empty string when none is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the key file cannot be read.
    pub fn key(&self) -> Result<String, ConfigError> {
        self.key_file
            .as_deref()
            .map_or_else(|| Ok(String::new()), read_file)
    }
}

/// `[daemon]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Remote directory under which daemons run.
    pub workdir: String,
    /// Minutes after which a running daemon is stopped.
    pub max_runtime_mins: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            workdir: "/tmp".to_owned(),
            max_runtime_mins: 120,
        }
    }
}

impl DaemonConfig {
    /// Daemon placement and limits.
    #[must_use]
    pub fn settings(&self) -> DaemonSettings {
        DaemonSettings {
            workdir: self.workdir.clone(),
            max_runtime: TimeDelta::minutes(i64::from(self.max_runtime_mins)),
        }
    }
}
