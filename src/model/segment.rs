use super::{kind::VersionedData, rule::SegmentRule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named set of users, defined by inclusion, exclusion and rules,
/// spec.md §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    pub key: String,
    pub version: u64,
    #[serde(default)]
    pub included: HashSet<String>,
    #[serde(default)]
    pub excluded: HashSet<String>,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    pub salt: String,
    #[serde(default)]
    pub deleted: bool,
}

impl VersionedData for Segment {
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
            included: HashSet::new(),
            excluded: HashSet::new(),
            rules: Vec::new(),
            salt: String::new(),
            deleted: true,
        }
    }
}
