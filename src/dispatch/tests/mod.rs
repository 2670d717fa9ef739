//! Unit tests for work intake.

mod locks_tests;
