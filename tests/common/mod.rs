//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Upper bound on how long a backend reply may take in tests
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Assert every element of `values` is approximately `expected`
pub fn assert_all_near(values: &[f64], expected: f64, epsilon: f64) {
    for (i, v) in values.iter().enumerate() {
        assert!(
            (v - expected).abs() < epsilon,
            "Sample {} was {}, expected {} (epsilon: {})",
            i,
            v,
            expected,
            epsilon
        );
    }
}
