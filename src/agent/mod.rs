//! The agent engine.
//!
//! Agents are stateless rules: each declares path-query preconditions and
//! turns a talk document into a [`Patch`](crate::talk::domain::Patch). The
//! [`AgentEngine`] runs an ordered list of them over a talk, writing each
//! effective patch back and repeating until a pass changes nothing.

pub mod builtin;
mod engine;
mod error;
mod ports;
mod standard;
mod templates;

#[cfg(test)]
mod tests;

pub use engine::{AgentEngine, EngineReport, EngineSettings, Outcome, RecordedError};
pub use error::{AgentError, EngineError};
pub use ports::{Agent, AgentHandle, is_ready, preconditions};
pub use standard::{Collaborators, standard};
pub use templates::ScriptTemplates;
