//! Test-only fixtures: flag/segment builders and a no-op [`Source`],
//! mirroring the teacher's `test_utils.rs` but built on the hand-written
//! model and the new `Kind`-polymorphic store.

use crate::message::Message;
use crate::model::{
    rollout::{Rollout, VariationOrRollout, WeightedVariation},
    rule::Target,
    Flag, Segment,
};
use crate::source::Source;
use crate::store::{FeatureStore, Item, Kind, MemoryStore};
use std::convert::Infallible;

/// A [`Source`] that never produces an update and never ends, for tests
/// that only care about evaluation against a pre-populated store.
pub struct NullSource;

impl Source for NullSource {
    type Error = Infallible;
    type Stream = futures::stream::Pending<Result<Message, Self::Error>>;

    fn stream(&self) -> Self::Stream {
        futures::stream::pending()
    }
}

/// Insert a [`Flag`] or [`Segment`] into a [`MemoryStore`] by serializing
/// it the same way a real `put`/`patch` payload would arrive.
pub async fn put_flag(store: &MemoryStore, flag: &Flag) {
    let item = Item::new(flag.key.clone(), flag.version, serde_json::to_value(flag).unwrap());
    store.upsert(Kind::FEATURES, item).await.unwrap();
}

pub async fn put_segment(store: &MemoryStore, segment: &Segment) {
    let item = Item::new(
        segment.key.clone(),
        segment.version,
        serde_json::to_value(segment).unwrap(),
    );
    store.upsert(Kind::SEGMENTS, item).await.unwrap();
}

pub struct FlagBuilder(Flag);

impl Default for FlagBuilder {
    fn default() -> Self {
        Self(Flag {
            key: "my-test-flag".into(),
            version: 1,
            on: true,
            prerequisites: Vec::new(),
            targets: Vec::new(),
            rules: Vec::new(),
            fallthrough: VariationOrRollout {
                variation: Some(0),
                rollout: None,
            },
            off_variation: Some(0),
            variations: vec![serde_json::json!(false), serde_json::json!(true)],
            salt: "test-salt".into(),
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
            client_side: false,
            deleted: false,
        })
    }
}

#[allow(dead_code)]
impl FlagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn off(mut self) -> Self {
        self.0.on = false;
        self
    }

    pub fn on(mut self) -> Self {
        self.0.on = true;
        self
    }

    pub fn with_key<K: Into<String>>(mut self, key: K) -> Self {
        self.0.key = key.into();
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.0.version = version;
        self
    }

    pub fn with_variations<I, V>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        self.0.variations = iter.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_off_variation(mut self, idx: usize) -> Self {
        self.0.off_variation = Some(idx);
        self
    }

    pub fn with_fallthrough_variation(mut self, idx: usize) -> Self {
        self.0.fallthrough = VariationOrRollout {
            variation: Some(idx),
            rollout: None,
        };
        self
    }

    pub fn with_fallthrough_rollout<I: IntoIterator<Item = (usize, u32)>>(mut self, variations: I) -> Self {
        let variations = variations
            .into_iter()
            .map(|(variation, weight)| WeightedVariation { variation, weight })
            .collect();
        self.0.fallthrough = VariationOrRollout {
            variation: None,
            rollout: Some(Rollout {
                variations,
                bucket_by: None,
            }),
        };
        self
    }

    pub fn with_rules(mut self, rules: Vec<crate::model::Rule>) -> Self {
        self.0.rules = rules;
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<crate::model::Prerequisite>) -> Self {
        self.0.prerequisites = prerequisites;
        self
    }

    pub fn clear_targets(mut self) -> Self {
        self.0.targets = Vec::new();
        self
    }

    pub fn add_target<V: Into<String>>(mut self, variation: usize, value: V) -> Self {
        if let Some(target) = self.0.targets.iter_mut().find(|t| t.variation == variation) {
            target.values.push(value.into());
        } else {
            self.0.targets.push(Target {
                variation,
                values: vec![value.into()],
            });
        }
        self
    }

    pub fn with_track_events(mut self, track: bool) -> Self {
        self.0.track_events = track;
        self
    }

    pub fn into_inner(self) -> Flag {
        self.0
    }
}

pub struct SegmentBuilder(Segment);

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self(Segment {
            key: "my-test-segment".into(),
            version: 1,
            included: Default::default(),
            excluded: Default::default(),
            rules: Vec::new(),
            salt: "test-salt".into(),
            deleted: false,
        })
    }
}

#[allow(dead_code)]
impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key<K: Into<String>>(mut self, key: K) -> Self {
        self.0.key = key.into();
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.0.version = version;
        self
    }

    pub fn included<I: IntoIterator<Item = S>, S: Into<String>>(mut self, iter: I) -> Self {
        self.0.included = iter.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluded<I: IntoIterator<Item = S>, S: Into<String>>(mut self, iter: I) -> Self {
        self.0.excluded = iter.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rules(mut self, rules: Vec<crate::model::rule::SegmentRule>) -> Self {
        self.0.rules = rules;
        self
    }

    pub fn into_inner(self) -> Segment {
        self.0
    }
}
