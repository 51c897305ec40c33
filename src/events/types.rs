//! Analytics event shapes, spec.md §4.5 / §6.
//!
//! `InputEvent` is what evaluation callers and `track()` hand to the
//! [`EventProcessor`](super::processor::EventProcessor)'s inbox.
//! `OutputEvent` is the wire shape POSTed to `/bulk`, discriminated by
//! `kind` per spec.md §6.

use crate::model::{Reason, User};
use serde::Serialize;

#[derive(Clone, Debug)]
pub enum InputEvent {
    FeatureRequest(FeatureRequestInput),
    Identify(IdentifyInput),
    Custom(CustomInput),
}

impl InputEvent {
    pub fn user(&self) -> &User {
        match self {
            InputEvent::FeatureRequest(e) => &e.user,
            InputEvent::Identify(e) => &e.user,
            InputEvent::Custom(e) => &e.user,
        }
    }

    pub fn creation_date(&self) -> i64 {
        match self {
            InputEvent::FeatureRequest(e) => e.creation_date,
            InputEvent::Identify(e) => e.creation_date,
            InputEvent::Custom(e) => e.creation_date,
        }
    }
}

/// One flag evaluation, as reported by the
/// [`Evaluator`](crate::evaluator::Evaluator) (top-level or prerequisite).
#[derive(Clone, Debug)]
pub struct FeatureRequestInput {
    pub user: User,
    pub flag_key: String,
    pub flag_version: Option<u64>,
    pub variation_index: Option<usize>,
    pub value: serde_json::Value,
    pub default: serde_json::Value,
    pub reason: Reason,
    /// Combined flag/rule/fallthrough tracking decision from the
    /// evaluator, OR'd with any explicit per-call tracking request.
    pub track_events: bool,
    pub debug_events_until_date: Option<i64>,
    pub prerequisite_of: Option<String>,
    pub creation_date: i64,
}

#[derive(Clone, Debug)]
pub struct IdentifyInput {
    pub user: User,
    pub creation_date: i64,
}

#[derive(Clone, Debug)]
pub struct CustomInput {
    pub user: User,
    pub key: String,
    pub data: Option<serde_json::Value>,
    pub metric_value: Option<f64>,
    pub creation_date: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind")]
pub enum OutputEvent {
    #[serde(rename = "feature")]
    Feature(FeatureEvent),
    #[serde(rename = "identify")]
    Identify(IdentifyEvent),
    #[serde(rename = "custom")]
    Custom(CustomEvent),
    #[serde(rename = "index")]
    Index(IndexEvent),
    #[serde(rename = "debug")]
    Debug(DebugEvent),
    #[serde(rename = "summary")]
    Summary(SummaryEvent),
}

#[derive(Clone, Debug, Serialize)]
pub struct FeatureEvent {
    #[serde(rename = "creationDate")]
    pub creation_date: i64,
    pub key: String,
    #[serde(rename = "userKey")]
    pub user_key: String,
    pub value: serde_json::Value,
    pub default: serde_json::Value,
    pub version: Option<u64>,
    pub variation: Option<usize>,
    #[serde(rename = "trackEvents")]
    pub track_events: bool,
    #[serde(rename = "prereqOf", skip_serializing_if = "Option::is_none")]
    pub prereq_of: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct IdentifyEvent {
    #[serde(rename = "creationDate")]
    pub creation_date: i64,
    pub user: User,
}

#[derive(Clone, Debug, Serialize)]
pub struct CustomEvent {
    #[serde(rename = "creationDate")]
    pub creation_date: i64,
    pub key: String,
    #[serde(rename = "userKey")]
    pub user_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(rename = "metricValue", skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct IndexEvent {
    #[serde(rename = "creationDate")]
    pub creation_date: i64,
    pub user: User,
}

#[derive(Clone, Debug, Serialize)]
pub struct DebugEvent {
    #[serde(rename = "creationDate")]
    pub creation_date: i64,
    pub key: String,
    pub user: User,
    pub value: serde_json::Value,
    pub default: serde_json::Value,
    pub version: Option<u64>,
    pub variation: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryEvent {
    #[serde(rename = "startDate")]
    pub start_date: i64,
    #[serde(rename = "endDate")]
    pub end_date: i64,
    pub features: std::collections::HashMap<String, SummaryFlag>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryFlag {
    pub default: serde_json::Value,
    pub counters: Vec<SummaryCounter>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryCounter {
    pub value: serde_json::Value,
    pub version: Option<u64>,
    pub variation: Option<usize>,
    pub count: u64,
}
