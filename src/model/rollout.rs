use serde::{Deserialize, Serialize};

/// One weighted variation within a [`Rollout`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: usize,
    /// Parts-per-million weight; the full set should sum to 100_000 but
    /// the evaluator tolerates an under-counting set by routing overflow
    /// to the last variation (spec.md §8 boundary behavior).
    pub weight: u32,
}

/// A percentage rollout across a flag's or rule's variations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rollout {
    pub variations: Vec<WeightedVariation>,
    /// Attribute bucketing is keyed on; defaults to `"key"` when absent.
    #[serde(rename = "bucketBy")]
    pub bucket_by: Option<String>,
}

/// Exactly one of a fixed variation index or a percentage rollout,
/// per spec.md §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariationOrRollout {
    pub variation: Option<usize>,
    pub rollout: Option<Rollout>,
}

impl VariationOrRollout {
    pub fn is_valid(&self) -> bool {
        self.variation.is_some() || self.rollout.is_some()
    }
}
