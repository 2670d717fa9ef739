//! Agents that acquire and release execution environments.

use super::{Timestamps, talk_name};
use crate::agent::error::AgentError;
use crate::agent::ports::{Agent, preconditions};
use crate::provision::{Environment, ProvisionerHandle};
use crate::talk::domain::{Document, Patch, PathError, PathQuery};
use async_trait::async_trait;

/// Acquires an environment for a daemon that has none yet.
#[derive(Debug)]
pub struct ProvisionsShell {
    provisioner: ProvisionerHandle,
    queries: Vec<PathQuery>,
}

impl ProvisionsShell {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in precondition fails to parse.
    pub fn new(provisioner: ProvisionerHandle) -> Result<Self, PathError> {
        Ok(Self {
            provisioner,
            queries: preconditions(&["/talk/daemon[not(ended)]", "/talk[not(shell)]"])?,
        })
    }
}

#[async_trait]
impl Agent for ProvisionsShell {
    fn name(&self) -> &'static str {
        "provisions-shell"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let talk = talk_name(document)?;
        let environment = self.provisioner.acquire(&talk).await?;
        tracing::info!(talk = %talk, environment = ?environment, "shell provisioned");
        Ok(environment.to_patch())
    }
}

/// Gives the environment back once the request is settled.
#[derive(Debug)]
pub struct ReleasesShell {
    provisioner: ProvisionerHandle,
    time: Timestamps,
    queries: Vec<PathQuery>,
    shell: PathQuery,
}

impl ReleasesShell {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in query fails to parse.
    pub fn new(provisioner: ProvisionerHandle, time: Timestamps) -> Result<Self, PathError> {
        Ok(Self {
            provisioner,
            time,
            queries: preconditions(&["/talk/request[success]", "/talk/shell[not(released)]"])?,
            shell: PathQuery::parse("/talk/shell")?,
        })
    }
}

#[async_trait]
impl Agent for ReleasesShell {
    fn name(&self) -> &'static str {
        "releases-shell"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let environment = Environment::from_document(document)?;
        if environment.immortal {
            tracing::info!(id = %environment.id, "immortal environment kept");
        } else {
            self.provisioner.release(&environment).await?;
            tracing::info!(id = %environment.id, "environment released");
        }
        Ok(Patch::new()
            .xpath(&self.shell)
            .strict(1)
            .add("released")
            .set(self.time.iso()))
    }
}
