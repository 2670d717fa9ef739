//! On-demand cloud instances.

use super::environment::Environment;
use super::error::{ProvisionError, ProvisionResult};
use super::ports::Provisioner;
use crate::talk::domain::TalkName;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;

/// A freshly started instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    /// Provider instance id.
    pub id: String,
    /// Public address.
    pub address: String,
}

/// The slice of a cloud provider API used for build instances.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Starts one on-demand instance.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Api`] when the provider refuses.
    async fn run_on_demand(&self) -> ProvisionResult<InstanceHandle>;

    /// Terminates an instance.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Api`] when the provider refuses.
    async fn terminate(&self, id: &str) -> ProvisionResult<()>;
}

/// How long to wait for a new instance to accept SSH connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    /// Probes made before giving up.
    pub attempts: u32,
    /// Pause between probes.
    pub delay: Duration,
    /// Time allowed for each connection attempt.
    pub timeout: Duration,
}

impl Default for Reachability {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay: Duration::from_secs(15),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Starts one instance per talk and terminates it on release.
pub struct InstanceProvisioner<A> {
    api: A,
    port: u16,
    login: String,
    key: String,
    reachability: Reachability,
}

impl<A: InstanceApi> InstanceProvisioner<A> {
    /// Uses `api`, connecting to instances as `login` with `key`.
    #[must_use]
    pub fn new(api: A, port: u16, login: &str, key: &str) -> Self {
        Self {
            api,
            port,
            login: login.to_owned(),
            key: key.to_owned(),
            reachability: Reachability::default(),
        }
    }

    /// Replaces the reachability probe settings.
    #[must_use]
    pub const fn with_reachability(mut self, reachability: Reachability) -> Self {
        self.reachability = reachability;
        self
    }

    async fn wait_reachable(&self, address: &str) -> ProvisionResult<()> {
        let attempts = self.reachability.attempts.max(1);
        for attempt in 1..=attempts {
            let probe = tokio::time::timeout(
                self.reachability.timeout,
                TcpStream::connect((address, self.port)),
            )
            .await;
            match probe {
                Ok(Ok(_stream)) => return Ok(()),
                Ok(Err(err)) => tracing::debug!(address, attempt, error = %err, "instance not reachable yet"),
                Err(_) => tracing::debug!(address, attempt, "instance probe timed out"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.reachability.delay).await;
            }
        }
        Err(ProvisionError::Unreachable {
            host: address.to_owned(),
            port: self.port,
            attempts,
        })
    }
}

impl<A> fmt::Debug for InstanceProvisioner<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceProvisioner")
            .field("port", &self.port)
            .field("login", &self.login)
            .field("reachability", &self.reachability)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<A: InstanceApi> Provisioner for InstanceProvisioner<A> {
    async fn acquire(&self, talk: &TalkName) -> ProvisionResult<Environment> {
        let instance = self.api.run_on_demand().await?;
        tracing::info!(talk = %talk, instance = %instance.id, address = %instance.address, "instance started");
        if let Err(err) = self.wait_reachable(&instance.address).await {
            if let Err(cleanup) = self.api.terminate(&instance.id).await {
                tracing::warn!(instance = %instance.id, error = %cleanup, "failed to terminate unreachable instance");
            }
            return Err(err);
        }
        Ok(Environment {
            id: instance.id,
            host: instance.address,
            port: self.port,
            login: self.login.clone(),
            key: self.key.clone(),
            immortal: false,
        })
    }

    async fn release(&self, environment: &Environment) -> ProvisionResult<()> {
        self.api.terminate(&environment.id).await?;
        tracing::info!(instance = %environment.id, "instance terminated");
        Ok(())
    }
}
