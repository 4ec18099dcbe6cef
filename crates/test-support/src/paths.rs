//! Test data path helpers, mirroring the `TEST_DATA_DIR` convention
//! used elsewhere in the wider weather/geospatial tooling this
//! workspace draws on.

use std::path::{Path, PathBuf};

/// Locate a named fixture file, checking `TEST_DATA_DIR` first (if
/// set), then a `testdata/` directory relative to the crate root.
/// Returns `None` if the file isn't found in either location.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("TEST_DATA_DIR") {
        let candidate = Path::new(&dir).join(name);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name);
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fixture_returns_none() {
        assert!(find_test_file("definitely-does-not-exist.bin").is_none());
    }
}
