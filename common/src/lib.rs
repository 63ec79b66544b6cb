pub mod config;

/// Common utilities shared across the shop backend
///
/// This crate provides functionality used by the service crates:
///
/// - Configuration loading
/// - Shared test id generators

// Test helpers module - available for both development and test builds
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(any(test, feature = "test-helpers"))]
pub use test_helpers::{generate_unique_code, generate_unique_id};
