//! Palaver: a continuous-delivery orchestrator.
//!
//! Every unit of work is a *talk*: a persisted, tree-structured document that
//! a fixed pipeline of stateless agents evolves until nothing more applies.
//! Agents that need remote effects run commands over SSH on provisioned
//! hosts and fold the outcome back into the talk.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: documents, paths, patches and work items, free of I/O
//! - **Ports**: async traits for stores, shells, provisioners, queues and
//!   notifiers
//! - **Adapters**: in-memory and directory stores, the `ssh` client
//!   transport, docker and cloud provisioners
//!
//! # Modules
//!
//! - [`talk`]: talk documents, path queries, patches and stores
//! - [`cache`]: read-through caching decorator for talk stores
//! - [`agent`]: the fixpoint engine and the built-in agents
//! - [`shell`]: remote command execution over SSH
//! - [`provision`]: acquiring and releasing build hosts
//! - [`dispatch`]: work queue, per-talk markers and the worker pool
//! - [`notify`]: outcome notifications
//! - [`config`]: TOML configuration
//! - [`telemetry`]: tracing subscriber set-up

pub mod agent;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod notify;
pub mod provision;
pub mod shell;
pub mod talk;
pub mod telemetry;

#[cfg(test)]
mod test_support;
