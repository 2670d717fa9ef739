//! Step definitions for agent engine scenarios.

mod given;
mod then;
mod when;
pub mod world;
