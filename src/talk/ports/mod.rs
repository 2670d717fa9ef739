//! Port contracts for talk storage.
//!
//! Ports define infrastructure-agnostic interfaces used by the agent engine,
//! the caching decorator and the dispatcher.

pub mod store;

pub use store::{Talk, TalkHandle, TalkStoreError, TalkStoreResult, Talks};
