//! Unit tests for provisioners.

mod provisioner_tests;
