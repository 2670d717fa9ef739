//! Unit tests for the agent engine and the built-in agents.
