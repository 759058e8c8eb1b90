//! Shared helpers for the compiler's test suites: an in-memory chain to run generated code on
//! and a diffing string assertion for rendered output.

pub mod chain;

pub use chain::{Chain, DEFAULT_CALLER, Failure, word};

/// Asserts that two multi-line strings are equal after trimming, printing a line diff first
/// when they are not.
///
/// `context` names what is compared in the panic message. `source`, if given, is printed
/// before the diff as the input the actual value was produced from.
pub fn assert_strings_with_diff(actual: &str, expected: &str, context: &str, source: Option<&str>) {
    let actual = actual.trim();
    let expected = expected.trim();
    if actual == expected {
        return;
    }

    if let Some(source) = source {
        eprintln!("=== Source ===\n{}\n", source.trim());
    }
    eprintln!("=== Expected ===\n{expected}\n");
    eprintln!("=== Actual ===\n{actual}\n");
    eprintln!("=== Diff ===");
    for (i, (expected_line, actual_line)) in expected.lines().zip(actual.lines()).enumerate() {
        if expected_line != actual_line {
            eprintln!("Line {}: - {expected_line}", i + 1);
            eprintln!("Line {}: + {actual_line}", i + 1);
        }
    }
    let (expected_lines, actual_lines) = (expected.lines().count(), actual.lines().count());
    if expected_lines != actual_lines {
        eprintln!("Line count mismatch: expected {expected_lines} lines, got {actual_lines} lines");
    }

    panic!("{context} mismatch");
}
