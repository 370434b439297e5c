//! Parser for libtest's terse listing output.
//!
//! `<binary> --list --format terse` emits one line per entry:
//!
//! ```text
//! manager_execution_test: test
//! channel_execution_test: test
//! throughput: benchmark
//! ```
//!
//! Only `test` entries are of interest; benchmarks are skipped.

use crate::DiscoveryError;
use std::path::Path;

/// Extract test names from terse listing output.
///
/// Blank lines and trailing summary lines ("N tests, M benchmarks") are
/// tolerated; anything else malformed is an error attributed to `binary`.
pub fn parse_terse_listing(binary: &Path, output: &str) -> Result<Vec<String>, DiscoveryError> {
    let mut names = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.rsplit_once(": ") {
            Some((name, "test")) => names.push(name.to_string()),
            Some((_, "benchmark")) => {}
            // Some libtest versions append a "N tests, M benchmarks"
            // summary even in terse mode.
            None if line.chars().next().is_some_and(|c| c.is_ascii_digit()) => {}
            _ => {
                return Err(DiscoveryError::Unparseable {
                    binary: binary.to_path_buf(),
                    line: line.to_string(),
                })
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bin() -> PathBuf {
        PathBuf::from("/target/debug/deps/integration_tests-0123abcd")
    }

    #[test]
    fn test_parse_plain_listing() {
        let out = "single_oracle_numerical_test: test\n\
                   three_of_three_oracle_numerical_test: test\n";
        let names = parse_terse_listing(&bin(), out).unwrap();
        assert_eq!(
            names,
            vec![
                "single_oracle_numerical_test".to_string(),
                "three_of_three_oracle_numerical_test".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_skips_benchmarks_and_summary() {
        let out = "roundtrip: test\nthroughput: benchmark\n\n1 test, 1 benchmarks\n";
        let names = parse_terse_listing(&bin(), out).unwrap();
        assert_eq!(names, vec!["roundtrip".to_string()]);
    }

    #[test]
    fn test_parse_empty_listing_is_ok() {
        let names = parse_terse_listing(&bin(), "").unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_terse_listing(&bin(), "error: unrecognized option\n").unwrap_err();
        assert!(matches!(err, DiscoveryError::Unparseable { .. }));
    }
}
