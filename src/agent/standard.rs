//! Assembly of the built-in agent pipeline.

use super::builtin::{
    ArchivesTalk, CancelsRequest, DaemonSettings, EndsDaemon, EndsRequest, ProvisionsShell, ReleasesShell,
    ReportsOutcome, StartsDaemon, StartsRequest, StopsDaemon, Timestamps,
};
use super::ports::{Agent, AgentHandle};
use super::templates::ScriptTemplates;
use crate::notify::Notifier;
use crate::provision::ProvisionerHandle;
use crate::shell::ShellFactory;
use crate::talk::domain::PathError;
use mockable::Clock;
use std::sync::Arc;

/// Everything the built-in agents need from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    /// Source of timestamps.
    pub clock: Arc<dyn Clock>,
    /// Builds shells from talk records.
    pub shells: Arc<dyn ShellFactory>,
    /// Acquires and releases environments.
    pub provisioner: ProvisionerHandle,
    /// Receives outcome summaries.
    pub notifier: Arc<dyn Notifier>,
    /// Request script templates.
    pub templates: ScriptTemplates,
    /// Daemon placement and limits.
    pub daemon: DaemonSettings,
}

/// Builds the built-in agents in execution order.
///
/// # Errors
///
/// Returns [`PathError`] if a built-in precondition fails to parse.
pub fn standard(with: &Collaborators) -> Result<Vec<AgentHandle>, PathError> {
    let time = Timestamps::new(Arc::clone(&with.clock));
    Ok(vec![
        handle(StartsRequest::new(with.templates.clone())?),
        handle(CancelsRequest::new()?),
        handle(ProvisionsShell::new(Arc::clone(&with.provisioner))?),
        handle(StartsDaemon::new(
            Arc::clone(&with.shells),
            time.clone(),
            with.daemon.clone(),
        )?),
        handle(StopsDaemon::new(
            Arc::clone(&with.shells),
            time.clone(),
            with.daemon.max_runtime,
        )?),
        handle(EndsDaemon::new(Arc::clone(&with.shells), time.clone())?),
        handle(EndsRequest::new()?),
        handle(ReleasesShell::new(Arc::clone(&with.provisioner), time.clone())?),
        handle(ReportsOutcome::new(Arc::clone(&with.notifier), time.clone())?),
        handle(ArchivesTalk::new(time)?),
    ])
}

fn handle(agent: impl Agent + 'static) -> AgentHandle {
    Arc::new(agent)
}
