//! Unit tests for talk documents and stores.

mod patch_tests;
