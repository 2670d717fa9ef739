//! `palaverd`: runs the palaver dispatcher until interrupted.
//!
//! Usage:
//!
//! ```text
//! palaverd [--config <FILE>] [--enqueue <ITEM.json>]...
//! ```
//!
//! Each `--enqueue` file holds one JSON work item, for example:
//!
//! ```json
//! {
//!   "id": "6c0b7a52-6f0e-4b53-9c55-3f5e3b0f4d11",
//!   "owner": "alice",
//!   "repo": "acme/widgets",
//!   "talk": "acme-widgets-42",
//!   "command": "deploy",
//!   "args": { "repo": "git@example.com:acme/widgets.git" },
//!   "scheduled": "2024-03-01T12:00:00Z"
//! }
//! ```
//!
//! Active talks found in the store are picked up by the periodic sweep.

use camino::Utf8PathBuf;
use clap::Parser;
use mockable::{Clock, DefaultClock};
use palaver::agent::{AgentEngine, Collaborators, ScriptTemplates, standard};
use palaver::cache::CachedTalks;
use palaver::config::{Config, ConfigError, read_file};
use palaver::dispatch::{DispatchError, Dispatcher, InMemoryWorkQueue, QueueError, WorkItem, WorkQueue};
use palaver::notify::LogNotifier;
use palaver::provision::{Immortal, ProvisionerHandle, StaticHost};
use palaver::shell::{OpenSshTransport, SshFactory};
use palaver::talk::adapters::DirTalks;
use palaver::talk::domain::PathError;
use palaver::talk::ports::TalkStoreError;
use palaver::telemetry;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "palaverd", version, about = "Continuous-delivery orchestrator daemon")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(long, short, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// JSON work item to queue at start-up. Repeatable.
    #[arg(long, value_name = "ITEM")]
    enqueue: Vec<Utf8PathBuf>,
}

/// Errors that stop the daemon.
#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot open talk store: {0}")]
    Store(#[from] TalkStoreError),
    #[error("cannot build agents: {0}")]
    Agents(#[from] PathError),
    #[error("invalid work item {path}: {source}")]
    Item {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn provisioner(config: &Config) -> Result<ProvisionerHandle, ConfigError> {
    let shell = &config.shell;
    let host = StaticHost::new(&shell.host, shell.port, &shell.login, &shell.key()?);
    Ok(if shell.immortal {
        Arc::new(Immortal::new(host))
    } else {
        Arc::new(host)
    })
}

fn build_engine(config: &Config, clock: Arc<dyn Clock>) -> Result<AgentEngine, DaemonError> {
    let transport = Arc::new(OpenSshTransport::new(config.ssh.program.clone()));
    let shells = SshFactory::new(transport)
        .with_retry(config.ssh.retry())
        .with_poll_interval(config.ssh.poll_interval())
        .with_deadline(config.ssh.deadline());
    let collaborators = Collaborators {
        clock: Arc::clone(&clock),
        shells: Arc::new(shells),
        provisioner: provisioner(config)?,
        notifier: Arc::new(LogNotifier),
        templates: ScriptTemplates::new(config.templates.clone()),
        daemon: config.daemon.settings(),
    };
    let agents = standard(&collaborators)?;
    Ok(AgentEngine::new(agents, clock, config.engine.settings()))
}

async fn enqueue(queue: &InMemoryWorkQueue, paths: &[Utf8PathBuf]) -> Result<(), DaemonError> {
    for path in paths {
        let item: WorkItem = serde_json::from_str(&read_file(path)?).map_err(|source| DaemonError::Item {
            path: path.clone(),
            source,
        })?;
        queue.push(item).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let installed = telemetry::init();
    let args = Args::parse();
    let config = args
        .config
        .as_deref()
        .map_or_else(|| Ok(Config::default()), Config::from_file)?;
    tracing::debug!(installed, config = ?args.config, "configuration loaded");

    let clock = Arc::new(DefaultClock);
    let store = DirTalks::open(&config.store.dir, Arc::clone(&clock), config.store.settings())?;
    let talks = CachedTalks::with_settings(Arc::new(store), config.cache.settings());
    let engine = build_engine(&config, clock)?;
    let queue = Arc::new(InMemoryWorkQueue::new());
    enqueue(&queue, &args.enqueue).await?;
    let dispatcher = Arc::new(Dispatcher::new(
        queue,
        Arc::new(talks),
        Arc::new(engine),
        config.dispatcher.settings(),
    ));

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received, shutting down"),
            Err(err) => tracing::error!(error = %err, "cannot listen for interrupts, shutting down"),
        }
        trigger.cancel();
    });
    tracing::info!(store = %config.store.dir, host = %config.shell.host, "palaverd started");
    dispatcher.run(&shutdown).await?;
    Ok(())
}
