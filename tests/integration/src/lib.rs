//! Integration test utilities for the feed engine
//!
//! In-memory stand-ins for the authoritative store and the change bus, plus
//! helpers for building controllers on top of them. Tests that need a real
//! PostgreSQL and Redis are skipped unless the environment provides them.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
