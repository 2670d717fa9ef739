//! Provisioner port.

use super::environment::Environment;
use super::error::ProvisionResult;
use crate::talk::domain::TalkName;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Hands out and takes back execution environments.
#[async_trait]
pub trait Provisioner: Send + Sync + fmt::Debug {
    /// Acquires an environment for the talk.
    ///
    /// # Errors
    ///
    /// Returns [`super::ProvisionError`] when no environment can be made
    /// ready.
    async fn acquire(&self, talk: &TalkName) -> ProvisionResult<Environment>;

    /// Gives an environment back.
    ///
    /// # Errors
    ///
    /// Returns [`super::ProvisionError`] when the provider refuses.
    async fn release(&self, environment: &Environment) -> ProvisionResult<()>;
}

/// Shared provisioner handle.
pub type ProvisionerHandle = Arc<dyn Provisioner>;
