//! Runs agents over a talk until nothing changes.

use super::error::{AgentError, EngineError};
use super::ports::{AgentHandle, is_ready};
use crate::talk::domain::{Document, Patch};
use crate::talk::ports::Talk;
use chrono::SecondsFormat;
use mockable::Clock;
use std::fmt;
use std::sync::Arc;

/// Engine tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound on passes per run; defaults to three per agent.
    pub max_passes: Option<usize>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A pass completed without changes.
    Settled,
    /// The pass limit was reached while agents were still firing.
    PassLimit,
    /// The talk was already inactive; no agent ran.
    Inactive,
}

/// One agent failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    /// Failing agent.
    pub agent: &'static str,
    /// Error text, as written into the talk.
    pub message: String,
}

/// Summary of an engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    /// How the run ended.
    pub outcome: Outcome,
    /// Passes started.
    pub passes: usize,
    /// Agents whose patches changed the talk, in firing order.
    pub fired: Vec<&'static str>,
    /// Agent failures recorded in the talk.
    pub errors: Vec<RecordedError>,
    /// Whether the run deactivated an archived talk.
    pub deactivated: bool,
}

impl EngineReport {
    const fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            passes: 0,
            fired: Vec::new(),
            errors: Vec::new(),
            deactivated: false,
        }
    }
}

/// An ordered list of agents driven to a fixpoint per talk.
pub struct AgentEngine {
    agents: Vec<AgentHandle>,
    clock: Arc<dyn Clock>,
    max_passes: usize,
}

impl fmt::Debug for AgentEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentEngine")
            .field(
                "agents",
                &self.agents.iter().map(|agent| agent.name()).collect::<Vec<_>>(),
            )
            .field("max_passes", &self.max_passes)
            .finish_non_exhaustive()
    }
}

impl AgentEngine {
    /// Creates an engine running `agents` in the given order.
    #[must_use]
    pub fn new(agents: Vec<AgentHandle>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        let max_passes = settings
            .max_passes
            .unwrap_or_else(|| agents.len().saturating_mul(3))
            .max(1);
        Self {
            agents,
            clock,
            max_passes,
        }
    }

    /// Returns the agents in execution order.
    #[must_use]
    pub fn agents(&self) -> &[AgentHandle] {
        &self.agents
    }

    /// Returns the pass limit in force.
    #[must_use]
    pub const fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Advances `talk` until a pass makes no change or the pass limit is hit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the talk cannot be read or
    /// written, including stale writes. Agent failures are recorded in the
    /// talk instead.
    pub async fn run(&self, talk: &dyn Talk) -> Result<EngineReport, EngineError> {
        if !talk.is_active().await? {
            tracing::debug!(talk = %talk.name(), "talk is inactive, skipped");
            return Ok(EngineReport::new(Outcome::Inactive));
        }
        let mut report = EngineReport::new(Outcome::Settled);
        let mut document = talk.read().await?;
        loop {
            if report.passes >= self.max_passes {
                tracing::warn!(talk = %talk.name(), passes = report.passes, "pass limit reached");
                report.outcome = Outcome::PassLimit;
                break;
            }
            report.passes = report.passes.saturating_add(1);
            if !self.pass(talk, &mut document, &mut report).await? {
                break;
            }
        }
        if document.section("archived").is_some() {
            talk.set_active(false).await?;
            report.deactivated = true;
            tracing::info!(talk = %talk.name(), "talk archived and deactivated");
        }
        Ok(report)
    }

    async fn pass(
        &self,
        talk: &dyn Talk,
        document: &mut Document,
        report: &mut EngineReport,
    ) -> Result<bool, EngineError> {
        let mut dirty = false;
        for agent in &self.agents {
            if !is_ready(agent.as_ref(), document) {
                continue;
            }
            let attempt = match agent.process(document).await {
                Ok(patch) => patch.apply(document).map(|next| (patch, next)).map_err(AgentError::from),
                Err(err) => Err(err),
            };
            match attempt {
                Ok((patch, next)) => {
                    if next == *document {
                        continue;
                    }
                    talk.modify(&patch).await?;
                    *document = talk.read().await?;
                    dirty = true;
                    report.fired.push(agent.name());
                    tracing::debug!(talk = %talk.name(), agent = agent.name(), "agent fired");
                }
                Err(AgentError::Store(err)) => return Err(EngineError::Store(err)),
                Err(err) => {
                    tracing::warn!(talk = %talk.name(), agent = agent.name(), error = %err, "agent failed");
                    let message = err.to_string();
                    self.record(talk, document, agent.name(), &message).await?;
                    report.errors.push(RecordedError {
                        agent: agent.name(),
                        message,
                    });
                }
            }
        }
        Ok(dirty)
    }

    /// Appends `/talk/errors/error[@agent,@at]` unless the same agent already
    /// recorded the same message.
    async fn record(
        &self,
        talk: &dyn Talk,
        document: &mut Document,
        agent: &str,
        message: &str,
    ) -> Result<(), EngineError> {
        let known = document.section("errors").is_some_and(|errors| {
            errors
                .children_named("error")
                .any(|error| error.attribute("agent") == Some(agent) && error.text() == Some(message))
        });
        if known {
            return Ok(());
        }
        let at = self.clock.utc().to_rfc3339_opts(SecondsFormat::Millis, true);
        let patch = Patch::new()
            .add_if("errors")
            .add("error")
            .attr("agent", agent)
            .attr("at", at)
            .set(message);
        talk.modify(&patch).await?;
        *document = talk.read().await?;
        Ok(())
    }
}
