//! Clause comparison operators, spec.md §4.1.
//!
//! Every comparison here is total: incompatible types simply don't match
//! (return `false`) rather than erroring, so a single malformed clause
//! value doesn't turn an otherwise-fine flag into `MALFORMED_FLAG` — it
//! just never matches. The flag-level `MALFORMED_FLAG` reason is reserved
//! for structural problems (bad variation index, missing rollout data).

use crate::model::Operator;
use chrono::DateTime;
use regex::Regex;
use semver::Version;
use serde_json::Value;

pub fn matches(op: Operator, user_value: &Value, literal: &Value) -> bool {
    use Operator::*;
    match op {
        In => deep_equal(user_value, literal),
        StartsWith => string_cmp(user_value, literal, |a, b| a.starts_with(b)),
        EndsWith => string_cmp(user_value, literal, |a, b| a.ends_with(b)),
        Contains => string_cmp(user_value, literal, |a, b| a.contains(b)),
        Matches => string_cmp(user_value, literal, |a, pattern| {
            Regex::new(pattern).map(|re| re.is_match(a)).unwrap_or(false)
        }),
        LessThan => numeric_cmp(user_value, literal, |a, b| a < b),
        LessThanOrEqual => numeric_cmp(user_value, literal, |a, b| a <= b),
        GreaterThan => numeric_cmp(user_value, literal, |a, b| a > b),
        GreaterThanOrEqual => numeric_cmp(user_value, literal, |a, b| a >= b),
        Before => date_cmp(user_value, literal, |a, b| a < b),
        After => date_cmp(user_value, literal, |a, b| a > b),
        SemVerEqual => semver_cmp(user_value, literal, |a, b| a == b),
        SemVerLessThan => semver_cmp(user_value, literal, |a, b| a < b),
        SemVerGreaterThan => semver_cmp(user_value, literal, |a, b| a > b),
        // segmentMatch is handled one layer up (evaluator::mod needs store
        // access to resolve segment membership), and Unknown never matches.
        SegmentMatch | Unknown => false,
    }
}

fn deep_equal(a: &Value, b: &Value) -> bool {
    a == b
}

fn string_cmp(a: &Value, b: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn numeric_cmp(a: &Value, b: &Value, f: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn parse_date_millis(v: &Value) -> Option<i64> {
    if let Some(ms) = v.as_i64() {
        return Some(ms);
    }
    if let Some(ms) = v.as_f64() {
        return Some(ms as i64);
    }
    let s = v.as_str()?;
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis())
}

fn date_cmp(a: &Value, b: &Value, f: impl Fn(i64, i64) -> bool) -> bool {
    match (parse_date_millis(a), parse_date_millis(b)) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

/// Parse a semver string, tolerating a trailing `.0` group LaunchDarkly's
/// own SDKs are documented to accept (e.g. `"2.0"` normalizes to
/// `"2.0.0"`), per spec.md §4.1.
fn parse_semver(s: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }
    let parts: Vec<&str> = s.split('.').collect();
    match parts.len() {
        1 => Version::parse(&format!("{}.0.0", parts[0])).ok(),
        2 => Version::parse(&format!("{}.{}.0", parts[0], parts[1])).ok(),
        _ => None,
    }
}

fn semver_cmp(a: &Value, b: &Value, f: impl Fn(&Version, &Version) -> bool) -> bool {
    match (a.as_str().and_then(parse_semver), b.as_str().and_then(parse_semver)) {
        (Some(a), Some(b)) => f(&a, &b),
        _ => false,
    }
}
