//! Per-interval aggregation of evaluation counters, spec.md §4.5.
//!
//! Records, per `(flagKey, variationIndex, flagVersion)`, a count plus the
//! default and evaluated values seen — one `Summary` event on flush
//! replaces every individual `FeatureRequest` whose `trackEvents` is
//! false, so a flag evaluated thousands of times a second doesn't flood
//! the events endpoint (spec.md §8 scenario 5).

use super::types::{FeatureRequestInput, SummaryCounter, SummaryEvent, SummaryFlag};
use std::collections::HashMap;

#[derive(Clone, Eq, PartialEq, Hash)]
struct CounterKey {
    flag_key: String,
    variation_index: Option<usize>,
    flag_version: Option<u64>,
}

struct FlagSummary {
    default: serde_json::Value,
    counters: HashMap<CounterKey, (serde_json::Value, u64)>,
}

pub struct Summarizer {
    start_date: i64,
    flags: HashMap<String, FlagSummary>,
}

impl Summarizer {
    pub fn new(now_millis: i64) -> Self {
        Self {
            start_date: now_millis,
            flags: HashMap::new(),
        }
    }

    pub fn record(&mut self, event: &FeatureRequestInput) {
        let flag = self.flags.entry(event.flag_key.clone()).or_insert_with(|| FlagSummary {
            default: event.default.clone(),
            counters: HashMap::new(),
        });
        let key = CounterKey {
            flag_key: event.flag_key.clone(),
            variation_index: event.variation_index,
            flag_version: event.flag_version,
        };
        let entry = flag
            .counters
            .entry(key)
            .or_insert_with(|| (event.value.clone(), 0));
        entry.1 += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Drain the accumulated counters into a wire-shaped `Summary` event,
    /// resetting the summarizer for the next interval (spec.md §4.5
    /// "The summarizer is reset on flush").
    pub fn flush(&mut self, now_millis: i64) -> Option<SummaryEvent> {
        if self.flags.is_empty() {
            return None;
        }
        let start_date = self.start_date;
        let features = std::mem::take(&mut self.flags)
            .into_iter()
            .map(|(flag_key, summary)| {
                let counters = summary
                    .counters
                    .into_iter()
                    .map(|(key, (value, count))| SummaryCounter {
                        value,
                        version: key.flag_version,
                        variation: key.variation_index,
                        count,
                    })
                    .collect();
                (
                    flag_key,
                    SummaryFlag {
                        default: summary.default,
                        counters,
                    },
                )
            })
            .collect();
        self.start_date = now_millis;
        Some(SummaryEvent {
            start_date,
            end_date: now_millis,
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reason;

    fn event(flag_key: &str, variation: Option<usize>) -> FeatureRequestInput {
        FeatureRequestInput {
            user: crate::model::User::new("u"),
            flag_key: flag_key.to_string(),
            flag_version: Some(1),
            variation_index: variation,
            value: serde_json::json!(true),
            default: serde_json::json!(false),
            reason: Reason::Fallthrough,
            track_events: false,
            debug_events_until_date: None,
            prerequisite_of: None,
            creation_date: 0,
        }
    }

    #[test]
    fn aggregates_repeated_evaluations_into_one_counter() {
        let mut summarizer = Summarizer::new(0);
        for _ in 0..1000 {
            summarizer.record(&event("flag-a", Some(0)));
        }
        let summary = summarizer.flush(1000).expect("summary expected");
        let flag = summary.features.get("flag-a").expect("flag in summary");
        assert_eq!(flag.counters.len(), 1);
        assert_eq!(flag.counters[0].count, 1000);
        assert!(summarizer.is_empty());
    }

    #[test]
    fn separates_counters_by_variation() {
        let mut summarizer = Summarizer::new(0);
        summarizer.record(&event("flag-a", Some(0)));
        summarizer.record(&event("flag-a", Some(1)));
        summarizer.record(&event("flag-a", Some(0)));
        let summary = summarizer.flush(10).unwrap();
        let flag = summary.features.get("flag-a").unwrap();
        assert_eq!(flag.counters.len(), 2);
    }
}
