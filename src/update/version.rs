//! Release version comparison.
//!
//! Versions are dotted sequences of numeric segments. Comparison is lenient:
//! a segment that is missing or does not parse as a number counts as 0, so a
//! malformed version string never makes the comparison fail.

use std::cmp::Ordering;

/// Parse one segment, degrading anything non-numeric to 0.
fn segment_value(segment: &str) -> u64 {
    segment.parse::<u64>().unwrap_or(0)
}

/// Split a version into its numeric segments.
fn segments(version: &str) -> Vec<u64> {
    version.split('.').map(segment_value).collect()
}

/// Compare two versions segment by segment, zero-padding the shorter one.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = segments(a);
    let b = segments(b);
    let len = a.len().max(b.len());

    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }

    Ordering::Equal
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

/// Strip a single leading non-numeric prefix character, as in `v1.2.0`.
pub fn strip_version_prefix(tag: &str) -> &str {
    let tag = tag.trim();
    match tag.chars().next() {
        Some(c) if !c.is_ascii_digit() => &tag[c.len_utf8()..],
        _ => tag,
    }
}
