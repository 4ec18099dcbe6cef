//! Shared test utilities for the qmag-nav workspace: synthetic grid
//! generators, fixture path lookup, and approximate-equality macros.

pub mod generators;
pub mod paths;

pub use generators::*;
pub use paths::*;

/// Skip a test if the named fixture file isn't present.
///
/// ```ignore
/// use test_support::require_test_file;
///
/// #[test]
/// fn reads_a_real_raster() {
///     let path = require_test_file!("sample.tif");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: test fixture '{}' not found. Set TEST_DATA_DIR or add it under testdata/.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Approximate floating-point equality assertion.
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

#[cfg(test)]
mod tests {
    #[test]
    fn assert_approx_eq_passes_within_epsilon() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn assert_approx_eq_fails_outside_epsilon() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }
}
