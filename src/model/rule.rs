use super::{clause::Clause, rollout::VariationOrRollout};
use serde::{Deserialize, Serialize};

/// An ordered targeting rule within a [`Flag`](super::flag::Flag).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier surfaced in `Reason::RuleMatch`, distinct from
    /// the rule's position (which can shift when rules are reordered).
    pub id: String,
    pub clauses: Vec<Clause>,
    #[serde(flatten)]
    pub variation_or_rollout: VariationOrRollout,
    #[serde(rename = "trackEvents", default)]
    pub track_events: bool,
}

/// A segment's own targeting rule. Segments reuse clause matching but
/// additionally support an inline bucketing weight instead of a full
/// [`VariationOrRollout`] (spec.md §4.1 "Segment match").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentRule {
    pub clauses: Vec<Clause>,
    pub weight: Option<u32>,
    #[serde(rename = "bucketBy")]
    pub bucket_by: Option<String>,
}

/// One entry of a flag's target list: `variation -> exact-match user keys`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    pub variation: usize,
    pub values: Vec<String>,
}

/// A prerequisite flag reference: this flag only evaluates past `OFF` if
/// the referenced flag is `on` and resolves to `required_variation`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}
