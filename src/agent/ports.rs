//! Agent port.

use super::error::AgentError;
use crate::talk::domain::{Document, Patch, PathError, PathQuery};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A stateless rule that evolves talk documents.
///
/// The engine calls [`Agent::process`] only when every query returned by
/// [`Agent::preconditions`] matches the current document.
#[async_trait]
pub trait Agent: Send + Sync + fmt::Debug {
    /// Short name used in logs and error records.
    fn name(&self) -> &'static str;

    /// Queries that must all match before the agent runs.
    fn preconditions(&self) -> &[PathQuery];

    /// Computes the changes this agent wants to make.
    ///
    /// An empty patch means there is nothing to do yet.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the agent cannot make progress.
    async fn process(&self, document: &Document) -> Result<Patch, AgentError>;
}

/// Shared agent handle.
pub type AgentHandle = Arc<dyn Agent>;

/// Parses a fixed list of precondition queries.
///
/// # Errors
///
/// Returns [`PathError`] for the first malformed query.
pub fn preconditions(queries: &[&str]) -> Result<Vec<PathQuery>, PathError> {
    queries.iter().map(|query| PathQuery::parse(query)).collect()
}

/// Returns `true` when every precondition of `agent` matches `document`.
#[must_use]
pub fn is_ready(agent: &dyn Agent, document: &Document) -> bool {
    agent
        .preconditions()
        .iter()
        .all(|query| document.matches(query))
}
