//! Assertion functions for testing graph outputs.

use crate::record::Record;

/// Assert that two record lists are equal in order and content.
///
/// Record equality ignores field order.
///
/// # Panics
///
/// Panics if the lists differ in length or content.
///
/// # Example
///
/// ```
/// use compgraph::record;
/// use compgraph::testing::assert_records_equal;
///
/// let actual = vec![record! { "a" => 1, "b" => 2 }];
/// assert_records_equal(&actual, &[record! { "b" => 2, "a" => 1 }]);
/// ```
pub fn assert_records_equal(actual: &[Record], expected: &[Record]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected: {}\n  Actual: {}\n  Expected records: {}\n  Actual records: {}",
        expected.len(),
        actual.len(),
        render(expected),
        render(actual),
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(
            a,
            e,
            "Record mismatch at index {i}:\n  Expected: {e}\n  Actual: {a}\n  Full actual: {}",
            render(actual)
        );
    }
}

/// Assert that two record lists hold the same records, ignoring order.
///
/// # Panics
///
/// Panics if a record is missing from or extra in `actual`.
pub fn assert_records_unordered_equal(actual: &[Record], expected: &[Record]) {
    let mut remaining: Vec<&Record> = expected.iter().collect();
    let mut extra = Vec::new();
    for record in actual {
        match remaining.iter().position(|e| *e == record) {
            Some(i) => {
                remaining.swap_remove(i);
            }
            None => extra.push(record),
        }
    }
    assert!(
        remaining.is_empty() && extra.is_empty(),
        "Record content mismatch:\n  Missing: {remaining:?}\n  Extra: {extra:?}\n  Actual: {}",
        render(actual)
    );
}

/// Assert that every record has (at least) the listed fields.
///
/// # Panics
///
/// Panics naming the first record that lacks one of the fields.
pub fn assert_all_have_fields(records: &[Record], fields: &[&str]) {
    for (i, record) in records.iter().enumerate() {
        for field in fields {
            assert!(
                record.contains(field),
                "Record {i} lacks field `{field}`: {record}"
            );
        }
    }
}

/// Assert that `records` are ordered non-decreasingly by `keys`.
///
/// # Panics
///
/// Panics at the first out-of-order pair, or if a key field is missing.
pub fn assert_sorted_by(records: &[Record], keys: &[&str]) {
    let mut previous = None;
    for (i, record) in records.iter().enumerate() {
        let key = record
            .key(keys)
            .unwrap_or_else(|field| panic!("Record {i} lacks key field `{field}`: {record}"));
        if let Some(prev) = &previous {
            assert!(
                *prev <= key,
                "Records out of order at index {i}: {prev:?} then {key:?}"
            );
        }
        previous = Some(key);
    }
}

fn render(records: &[Record]) -> String {
    let items: Vec<String> = records.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Assert that two floats differ by at most a tolerance (default `1e-9`).
///
/// ```
/// use compgraph::assert_approx_eq;
///
/// assert_approx_eq!(0.1 + 0.2, 0.3);
/// assert_approx_eq!(2.0_f64.ln(), 0.6931, 1e-4);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr $(,)?) => {
        $crate::assert_approx_eq!($actual, $expected, 1e-9)
    };
    ($actual:expr, $expected:expr, $tolerance:expr $(,)?) => {{
        let (actual, expected, tolerance): (f64, f64, f64) = ($actual, $expected, $tolerance);
        assert!(
            (actual - expected).abs() <= tolerance,
            "assertion failed: `{} ≈ {}` (tolerance {})",
            actual,
            expected,
            tolerance
        );
    }};
}
