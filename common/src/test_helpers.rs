/// Shared test helpers for cross-crate use
///
/// Unique id generators so parallel tests never collide on cart ids or
/// discount codes.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// Global counter for truly unique test identifiers across parallel tests
static GLOBAL_TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique string identifier in the format `{prefix}-{timestamp}-{counter}`.
pub fn generate_unique_id(prefix: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    let counter = GLOBAL_TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}", prefix, timestamp, counter)
}

/// Generate a unique uppercase discount-style code.
pub fn generate_unique_code(prefix: &str) -> String {
    generate_unique_id(prefix).to_uppercase()
}
