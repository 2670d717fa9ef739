//! Shared world state and test agents for agent engine scenarios.

use async_trait::async_trait;
use mockable::DefaultClock;
use palaver::agent::{
    Agent, AgentEngine, AgentError, AgentHandle, EngineError, EngineReport, EngineSettings,
    preconditions,
};
use palaver::talk::adapters::InMemoryTalks;
use palaver::talk::domain::{Document, Patch, PathError, PathQuery};
use palaver::talk::ports::TalkHandle;
use rstest::fixture;
use std::sync::Arc;

/// Store type used by the BDD world.
pub type TestTalks = InMemoryTalks<DefaultClock>;

/// Scenario world for agent engine behaviour tests.
pub struct EngineWorld {
    pub talks: TestTalks,
    pub talk: Option<TalkHandle>,
    pub agents: Vec<AgentHandle>,
    pub reports: Vec<Result<EngineReport, EngineError>>,
}

impl EngineWorld {
    /// Creates a world with an empty store and no agents.
    #[must_use]
    pub fn new() -> Self {
        Self {
            talks: InMemoryTalks::new(Arc::new(DefaultClock)),
            talk: None,
            agents: Vec::new(),
            reports: Vec::new(),
        }
    }

    /// Builds an engine over the agents registered so far.
    #[must_use]
    pub fn engine(&self) -> AgentEngine {
        AgentEngine::new(self.agents.clone(), Arc::new(DefaultClock), EngineSettings::default())
    }

    /// Returns the talk under test.
    ///
    /// # Errors
    ///
    /// Fails when no talk was opened yet.
    pub fn talk(&self) -> Result<&TalkHandle, eyre::Report> {
        self.talk
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing talk in scenario world"))
    }

    /// Returns the report of the most recent run.
    ///
    /// # Errors
    ///
    /// Fails when the engine has not run or the run failed.
    pub fn last_report(&self) -> Result<&EngineReport, eyre::Report> {
        match self.reports.last() {
            Some(Ok(report)) => Ok(report),
            Some(Err(err)) => Err(eyre::eyre!("engine run failed: {err}")),
            None => Err(eyre::eyre!("engine has not run")),
        }
    }
}

impl Default for EngineWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> EngineWorld {
    EngineWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Adds a root section once, optionally waiting for another one.
#[derive(Debug)]
pub struct Marker {
    section: &'static str,
    preconditions: Vec<PathQuery>,
}

impl Marker {
    /// Creates a marker writing `section`, gated on `requires` when given.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] when a section name does not form a valid query.
    pub fn new(section: &str, requires: Option<&str>) -> Result<Self, PathError> {
        let absent = format!("/talk[not({section})]");
        let mut queries = vec![absent];
        queries.extend(requires.map(|other| format!("/talk/{other}")));
        let borrowed: Vec<&str> = queries.iter().map(String::as_str).collect();
        Ok(Self {
            section: Box::leak(section.to_owned().into_boxed_str()),
            preconditions: preconditions(&borrowed)?,
        })
    }
}

#[async_trait]
impl Agent for Marker {
    fn name(&self) -> &'static str {
        self.section
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.preconditions
    }

    async fn process(&self, _document: &Document) -> Result<Patch, AgentError> {
        Ok(Patch::new().add(self.section))
    }
}

/// Always ready, never changes anything.
#[derive(Debug, Default)]
pub struct Idle;

#[async_trait]
impl Agent for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &[]
    }

    async fn process(&self, _document: &Document) -> Result<Patch, AgentError> {
        Ok(Patch::new())
    }
}

/// Always ready, always fails with the same message.
#[derive(Debug)]
pub struct Failing {
    pub message: String,
}

#[async_trait]
impl Agent for Failing {
    fn name(&self) -> &'static str {
        "fails"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &[]
    }

    async fn process(&self, _document: &Document) -> Result<Patch, AgentError> {
        Err(AgentError::Malformed(self.message.clone()))
    }
}
