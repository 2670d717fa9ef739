//! Unit tests for the caching decorator.

mod coherence_tests;
