//! Shared test fixtures.

pub mod harness;
