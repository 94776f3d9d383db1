//! Shared test utilities for the climate pipeline workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Upstream CSV fixtures (GISTEMP, FIRMS)
//! - Row builders for warehouse and summary tests
//! - Scratch storage roots
//! - Skip macros for tests that need a live database
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, require_database_url};
//! ```

pub mod fixtures;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use paths::*;

/// Macro to skip a test unless `TEST_DATABASE_URL` is set.
///
/// Postgres tests drop and recreate the warehouse tables, so they only run
/// against a database the caller explicitly hands over.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_database_url;
///
/// #[tokio::test]
/// async fn test_against_postgres() {
///     let url = require_database_url!();
///     // Test code using url...
/// }
/// ```
#[macro_export]
macro_rules! require_database_url {
    () => {{
        match $crate::database_url() {
            Some(url) => url,
            None => {
                eprintln!("SKIPPED: TEST_DATABASE_URL is not set.");
                return;
            }
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// `TEST_DATABASE_URL`, if set and non-empty.
pub fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }
}
