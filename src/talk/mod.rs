//! Talks: named documents that record the state of one unit of work.
//!
//! The module follows hexagonal architecture:
//!
//! - Domain types (documents, path queries, patches) in [`domain`]
//! - Store contracts in [`ports`]
//! - In-memory and directory-backed stores in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
