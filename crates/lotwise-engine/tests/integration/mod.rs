//! Integration tests for lotwise-engine.
//!
//! These tests drive the engine facade end to end against the paper
//! market, a scripted order placer and a manual clock.

pub mod common;
