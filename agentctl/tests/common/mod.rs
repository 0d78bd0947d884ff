//! Shared fixtures and helpers for the integration test suites

pub mod fixtures;
pub mod helpers;

pub use fixtures::TestFixtures;
pub use helpers::*;
