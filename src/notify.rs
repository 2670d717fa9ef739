//! Outcome notifications.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while delivering a notification.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// The channel refused the message.
    #[error("notification rejected: {0}")]
    Rejected(String),

    /// The channel could not be reached.
    #[error("notification channel failed: {0}")]
    Channel(Arc<dyn StdError + Send + Sync>),
}

impl NotifyError {
    /// Wraps a transport failure.
    pub fn channel<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Channel(Arc::new(err))
    }
}

/// Posts human-readable messages about a talk.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the message could not be delivered.
    async fn post(&self, text: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn post(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "palaver::notify", "{text}");
        Ok(())
    }
}
