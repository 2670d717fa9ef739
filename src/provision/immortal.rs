//! Keeps environments alive past their talks.

use super::environment::Environment;
use super::error::ProvisionResult;
use super::ports::Provisioner;
use crate::talk::domain::TalkName;
use async_trait::async_trait;

/// Marks every environment immortal; release only logs.
#[derive(Debug, Clone)]
pub struct Immortal<P> {
    inner: P,
}

impl<P> Immortal<P> {
    /// Wraps a provisioner.
    #[must_use]
    pub const fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: Provisioner> Provisioner for Immortal<P> {
    async fn acquire(&self, talk: &TalkName) -> ProvisionResult<Environment> {
        let mut environment = self.inner.acquire(talk).await?;
        environment.immortal = true;
        Ok(environment)
    }

    async fn release(&self, environment: &Environment) -> ProvisionResult<()> {
        tracing::info!(id = %environment.id, "environment is immortal, left running");
        Ok(())
    }
}
