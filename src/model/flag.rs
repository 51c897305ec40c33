use super::{
    kind::VersionedData,
    rollout::VariationOrRollout,
    rule::{Prerequisite, Rule, Target},
};
use serde::{Deserialize, Serialize};

/// A feature flag, spec.md §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flag {
    pub key: String,
    pub version: u64,
    pub on: bool,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub fallthrough: VariationOrRollout,
    #[serde(rename = "offVariation")]
    pub off_variation: Option<usize>,
    pub variations: Vec<serde_json::Value>,
    pub salt: String,
    #[serde(rename = "trackEvents", default)]
    pub track_events: bool,
    #[serde(rename = "trackEventsFallthrough", default)]
    pub track_events_fallthrough: bool,
    #[serde(rename = "debugEventsUntilDate")]
    pub debug_events_until_date: Option<i64>,
    #[serde(rename = "clientSide", default)]
    pub client_side: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Flag {
    /// Look up a variation value by index, the way every evaluation
    /// outcome ultimately resolves to a JSON value.
    pub fn variation_value(&self, index: usize) -> Option<&serde_json::Value> {
        self.variations.get(index)
    }

    pub fn variation_count(&self) -> usize {
        self.variations.len()
    }
}

impl VersionedData for Flag {
    fn key(&self) -> &str {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn deleted(&self) -> bool {
        self.deleted
    }

    fn tombstone(key: &str, version: u64) -> Self {
        Self {
            key: key.to_string(),
            version,
            on: false,
            prerequisites: Vec::new(),
            targets: Vec::new(),
            rules: Vec::new(),
            fallthrough: VariationOrRollout {
                variation: None,
                rollout: None,
            },
            off_variation: None,
            variations: Vec::new(),
            salt: String::new(),
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
            client_side: false,
            deleted: true,
        }
    }
}
