//! A single pre-registered host.

use super::environment::Environment;
use super::error::ProvisionResult;
use super::ports::Provisioner;
use crate::talk::domain::TalkName;
use async_trait::async_trait;

/// Always hands out the same host; release does nothing.
#[derive(Debug, Clone)]
pub struct StaticHost {
    environment: Environment,
}

impl StaticHost {
    /// Registers the host.
    #[must_use]
    pub fn new(host: &str, port: u16, login: &str, key: &str) -> Self {
        Self {
            environment: Environment {
                id: format!("static:{host}:{port}"),
                host: host.to_owned(),
                port,
                login: login.to_owned(),
                key: key.to_owned(),
                immortal: false,
            },
        }
    }
}

#[async_trait]
impl Provisioner for StaticHost {
    async fn acquire(&self, talk: &TalkName) -> ProvisionResult<Environment> {
        tracing::debug!(talk = %talk, host = %self.environment.host, "static host assigned");
        Ok(self.environment.clone())
    }

    async fn release(&self, environment: &Environment) -> ProvisionResult<()> {
        tracing::debug!(id = %environment.id, "static host released");
        Ok(())
    }
}
