use serde::{Deserialize, Serialize};

/// A single condition within a [`Rule`](super::rule::Rule) or a
/// [`Segment`](super::segment::Segment) rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clause {
    pub attribute: String,
    pub op: Operator,
    pub values: Vec<serde_json::Value>,
    #[serde(default)]
    pub negate: bool,
}

/// Clause comparison operators, spec.md §4.1.
///
/// An unrecognized operator string fails deserialization of the clause; a
/// flag payload containing one is handled as `MALFORMED_FLAG` by the
/// evaluator's clause-matching step (operators known to exist in the wire
/// format but not understood by this SDK version still parse, they just
/// never match, via `Unknown`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    In,
    EndsWith,
    StartsWith,
    Contains,
    Matches,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Before,
    After,
    SemVerEqual,
    SemVerLessThan,
    SemVerGreaterThan,
    SegmentMatch,
    #[serde(other)]
    Unknown,
}
