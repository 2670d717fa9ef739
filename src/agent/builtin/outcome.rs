//! Terminal agents: reporting and archiving.

use super::{Timestamps, section};
use crate::agent::error::AgentError;
use crate::agent::ports::{Agent, preconditions};
use crate::notify::Notifier;
use crate::talk::domain::{Document, Patch, PathError, PathQuery};
use async_trait::async_trait;
use std::sync::Arc;

/// Posts a summary of the finished request.
#[derive(Debug)]
pub struct ReportsOutcome {
    notifier: Arc<dyn Notifier>,
    time: Timestamps,
    queries: Vec<PathQuery>,
    request: PathQuery,
}

impl ReportsOutcome {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in query fails to parse.
    pub fn new(notifier: Arc<dyn Notifier>, time: Timestamps) -> Result<Self, PathError> {
        Ok(Self {
            notifier,
            time,
            queries: preconditions(&["/talk/request[success and not(reported)]"])?,
            request: PathQuery::parse("/talk/request")?,
        })
    }
}

/// Builds the human-readable summary of a settled request.
pub(crate) fn summary(document: &Document) -> Result<String, AgentError> {
    let request = section(document, "request")?;
    let talk = document.talk_name().unwrap_or_default();
    let kind = request.child_text("type").unwrap_or("request");
    let started = document
        .section("daemon")
        .is_some_and(|daemon| daemon.has_child("started"));
    let verdict = if request.has_child("cancel") && !started {
        "was cancelled".to_owned()
    } else if request.child_text("success") == Some("true") {
        format!("succeeded in {} ms", request.child_text("msec").unwrap_or("0"))
    } else {
        let code = document
            .section("daemon")
            .and_then(|daemon| daemon.child_text("code"))
            .unwrap_or("?");
        format!("failed with code {code}")
    };
    let mut text = format!("{talk}: {kind} {verdict}");
    if let Some(highlights) = document
        .section("daemon")
        .and_then(|daemon| daemon.child_text("highlights"))
        .filter(|highlights| !highlights.is_empty())
    {
        text.push('\n');
        text.push_str(highlights);
    }
    Ok(text)
}

#[async_trait]
impl Agent for ReportsOutcome {
    fn name(&self) -> &'static str {
        "reports-outcome"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let text = summary(document)?;
        let delivered = match self.notifier.post(&text).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(talk = ?document.talk_name(), error = %err, "outcome notification failed");
                false
            }
        };
        Ok(Patch::new()
            .xpath(&self.request)
            .strict(1)
            .add("reported")
            .attr("delivered", delivered.to_string())
            .set(self.time.iso()))
    }
}

/// Marks a fully settled talk as archived.
#[derive(Debug)]
pub struct ArchivesTalk {
    time: Timestamps,
    queries: Vec<PathQuery>,
}

impl ArchivesTalk {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in precondition fails to parse.
    pub fn new(time: Timestamps) -> Result<Self, PathError> {
        Ok(Self {
            time,
            queries: preconditions(&[
                "/talk/request[success and reported]",
                "/talk[not(archived) and (not(shell) or shell/released)]",
            ])?,
        })
    }
}

#[async_trait]
impl Agent for ArchivesTalk {
    fn name(&self) -> &'static str {
        "archives-talk"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        tracing::info!(talk = ?document.talk_name(), "talk archived");
        Ok(Patch::new().add("archived").set(self.time.iso()))
    }
}
