//! Unit tests for remote execution.

mod escape_tests;
