//! Deterministic rule interpreter, spec.md §4.1.
//!
//! `Evaluator::evaluate` is the SDK's pure core: given a flag key, a user
//! and a [`FeatureStore`], it walks prerequisites, targets, rules and
//! fallthrough and always settles on an [`EvaluationDetail`] — it never
//! propagates an error to the caller (spec.md §7 "Evaluator MUST NOT
//! propagate exceptions to host code").
//!
//! This replaces the teacher's `Evaluation` (which explicitly bails out
//! with `Error::UnsupportedRules` on any flag that has rules at all, and
//! has no clause, segment, regex or semver support) with the full
//! interpreter, while keeping its recursive `Evaluation::new(store, flag,
//! user).index()` shape for prerequisite chaining.

pub mod bucketing;
pub mod operators;

use crate::model::{
    Clause, EvalErrorKind, EvaluationDetail, Flag, Kind, Operator, Reason, Rollout, Segment, User,
    VariationOrRollout,
};
use crate::store::FeatureStore;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;

/// Prevents pathologically deep (but acyclic) prerequisite chains from
/// recursing unboundedly. Not named in spec.md; recorded as an
/// implementation choice in DESIGN.md.
const MAX_PREREQUISITE_DEPTH: usize = 10;

/// A single prerequisite flag's evaluation outcome, carried back to the
/// caller so it can be turned into a `FeatureRequest` analytics event
/// (spec.md §4.1 "Emit an event for *every* prerequisite evaluated, pass
/// or fail").
#[derive(Clone, Debug)]
pub struct PrerequisiteEvaluation {
    pub flag_key: String,
    pub flag_version: Option<u64>,
    pub variation_index: Option<usize>,
    pub value: serde_json::Value,
    pub reason: Reason,
    pub track_events: bool,
    pub prerequisite_of: String,
}

/// Full result of evaluating the top-level flag, plus every prerequisite
/// event that evaluation produced along the way.
#[derive(Clone, Debug)]
pub struct EvaluationOutcome {
    pub detail: EvaluationDetail,
    pub flag_version: Option<u64>,
    /// Combined "should this evaluation be fully tracked" decision: the
    /// flag's own `trackEvents`, or the matched rule's `trackEvents`, or
    /// (on a fallthrough) the flag's `trackEventsFallthrough` — spec.md
    /// §4.5 step 2. Callers only need to OR this with their own explicit
    /// per-call tracking request.
    pub track_events: bool,
    pub debug_events_until_date: Option<i64>,
    pub prerequisite_events: Vec<PrerequisiteEvaluation>,
}

struct FlagEvalOutcome {
    detail: EvaluationDetail,
    flag_version: Option<u64>,
    track_events: bool,
    debug_events_until_date: Option<i64>,
}

/// Used to evaluate flags by reading from a [`FeatureStore`] and running
/// the flag evaluation algorithm (spec.md §4.1).
pub struct Evaluator<S> {
    store: S,
}

impl<S> Evaluator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: FeatureStore + Sync> Evaluator<S> {
    /// Evaluate `flag_key` for `user`, returning a full detail plus any
    /// prerequisite events generated along the way. `default` is returned
    /// verbatim whenever the result is `Reason::Error` (spec.md §7).
    pub async fn evaluate(
        &self,
        flag_key: &str,
        user: &User,
        default: serde_json::Value,
    ) -> EvaluationOutcome {
        if user.key.is_empty() {
            return EvaluationOutcome {
                detail: EvaluationDetail::error(EvalErrorKind::UserNotSpecified, default),
                flag_version: None,
                track_events: false,
                debug_events_until_date: None,
                prerequisite_events: Vec::new(),
            };
        }

        let mut visited = HashSet::new();
        let mut prereq_events = Vec::new();
        let outcome = self
            .eval_flag_by_key(flag_key, user, &default, &mut visited, &mut prereq_events)
            .await;

        EvaluationOutcome {
            detail: outcome.detail,
            flag_version: outcome.flag_version,
            track_events: outcome.track_events,
            debug_events_until_date: outcome.debug_events_until_date,
            prerequisite_events: prereq_events,
        }
    }

    fn eval_flag_by_key<'a>(
        &'a self,
        flag_key: &'a str,
        user: &'a User,
        default: &'a serde_json::Value,
        visited: &'a mut HashSet<String>,
        prereq_events: &'a mut Vec<PrerequisiteEvaluation>,
    ) -> BoxFuture<'a, FlagEvalOutcome> {
        async move {
            let item = match self.store.get(Kind::FEATURES, flag_key).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    return FlagEvalOutcome {
                        detail: EvaluationDetail::error(EvalErrorKind::FlagNotFound, default.clone()),
                        flag_version: None,
                        track_events: false,
                        debug_events_until_date: None,
                    }
                }
                Err(_) => {
                    return FlagEvalOutcome {
                        detail: EvaluationDetail::error(EvalErrorKind::Exception, default.clone()),
                        flag_version: None,
                        track_events: false,
                        debug_events_until_date: None,
                    }
                }
            };
            let flag: Flag = match item.parse() {
                Ok(f) => f,
                Err(_) => {
                    return FlagEvalOutcome {
                        detail: EvaluationDetail::error(EvalErrorKind::MalformedFlag, default.clone()),
                        flag_version: Some(item.version),
                        track_events: false,
                        debug_events_until_date: None,
                    }
                }
            };
            self.eval_flag(&flag, user, default, visited, prereq_events).await
        }
        .boxed()
    }

    fn eval_flag<'a>(
        &'a self,
        flag: &'a Flag,
        user: &'a User,
        default: &'a serde_json::Value,
        visited: &'a mut HashSet<String>,
        prereq_events: &'a mut Vec<PrerequisiteEvaluation>,
    ) -> BoxFuture<'a, FlagEvalOutcome> {
        async move {
            if !flag.on {
                return self.off_outcome(flag, default);
            }

            if visited.len() >= MAX_PREREQUISITE_DEPTH || !visited.insert(flag.key.clone()) {
                // revisiting a flag already on the current prerequisite
                // path is a cycle; exceeding the depth bound is treated
                // the same way, per spec.md §8 "A prerequisite cycle is
                // detected and returns MALFORMED_FLAG".
                return FlagEvalOutcome {
                    detail: EvaluationDetail::error(EvalErrorKind::MalformedFlag, default.clone()),
                    flag_version: Some(flag.version),
                    track_events: flag.track_events,
                    debug_events_until_date: flag.debug_events_until_date,
                };
            }

            let result = self
                .eval_flag_body(flag, user, default, visited, prereq_events)
                .await;
            visited.remove(&flag.key);
            result
        }
        .boxed()
    }

    fn eval_flag_body<'a>(
        &'a self,
        flag: &'a Flag,
        user: &'a User,
        default: &'a serde_json::Value,
        visited: &'a mut HashSet<String>,
        prereq_events: &'a mut Vec<PrerequisiteEvaluation>,
    ) -> BoxFuture<'a, FlagEvalOutcome> {
        async move {
            for prereq in &flag.prerequisites {
                let prereq_default = serde_json::Value::Null;
                let prereq_outcome = self
                    .eval_flag_by_key(&prereq.key, user, &prereq_default, visited, prereq_events)
                    .await;

                let passed = !matches!(prereq_outcome.detail.reason, Reason::Off)
                    && prereq_outcome.detail.variation_index == Some(prereq.variation);

                prereq_events.push(PrerequisiteEvaluation {
                    flag_key: prereq.key.clone(),
                    flag_version: prereq_outcome.flag_version,
                    variation_index: prereq_outcome.detail.variation_index,
                    value: prereq_outcome.detail.value.clone(),
                    reason: prereq_outcome.detail.reason.clone(),
                    track_events: prereq_outcome.track_events,
                    prerequisite_of: flag.key.clone(),
                });

                if !passed {
                    let detail = self.variation_detail_or_off(
                        flag,
                        default,
                        Reason::PrerequisiteFailed {
                            prerequisite_key: prereq.key.clone(),
                        },
                    );
                    return FlagEvalOutcome {
                        detail,
                        flag_version: Some(flag.version),
                        track_events: flag.track_events,
                        debug_events_until_date: flag.debug_events_until_date,
                    };
                }
            }

            if let Some(variation) = self.matching_target(flag, user) {
                let detail = self.variation_result(flag, variation, Reason::TargetMatch, default);
                return FlagEvalOutcome {
                    detail,
                    flag_version: Some(flag.version),
                    track_events: flag.track_events,
                    debug_events_until_date: flag.debug_events_until_date,
                };
            }

            for (index, rule) in flag.rules.iter().enumerate() {
                match self.rule_matches(rule, user).await {
                    Ok(true) => {
                        let reason = Reason::RuleMatch {
                            rule_index: index,
                            rule_id: rule.id.clone(),
                        };
                        let detail = self.resolve_variation_or_rollout(
                            flag,
                            &rule.variation_or_rollout,
                            user,
                            reason,
                            default,
                        );
                        return FlagEvalOutcome {
                            detail,
                            flag_version: Some(flag.version),
                            track_events: flag.track_events || rule.track_events,
                            debug_events_until_date: flag.debug_events_until_date,
                        };
                    }
                    Ok(false) => continue,
                    Err(kind) => {
                        return FlagEvalOutcome {
                            detail: EvaluationDetail::error(kind, default.clone()),
                            flag_version: Some(flag.version),
                            track_events: flag.track_events,
                            debug_events_until_date: flag.debug_events_until_date,
                        }
                    }
                }
            }

            let detail = self.resolve_variation_or_rollout(
                flag,
                &flag.fallthrough,
                user,
                Reason::Fallthrough,
                default,
            );
            FlagEvalOutcome {
                track_events: flag.track_events || flag.track_events_fallthrough,
                detail,
                flag_version: Some(flag.version),
                debug_events_until_date: flag.debug_events_until_date,
            }
        }
        .boxed()
    }

    fn off_outcome(&self, flag: &Flag, default: &serde_json::Value) -> FlagEvalOutcome {
        let detail = match flag.off_variation {
            Some(index) => self.variation_result(flag, index, Reason::Off, default),
            None => EvaluationDetail {
                value: serde_json::Value::Null,
                variation_index: None,
                reason: Reason::Off,
            },
        };
        FlagEvalOutcome {
            detail,
            flag_version: Some(flag.version),
            track_events: flag.track_events,
            debug_events_until_date: flag.debug_events_until_date,
        }
    }

    /// Resolve the off-variation with a specific non-Off reason — used
    /// for `PREREQUISITE_FAILED`, which still returns the flag's off
    /// value per spec.md §4.1 step 2.
    fn variation_detail_or_off(
        &self,
        flag: &Flag,
        default: &serde_json::Value,
        reason: Reason,
    ) -> EvaluationDetail {
        match flag.off_variation {
            Some(index) => self.variation_result(flag, index, reason, default),
            None => EvaluationDetail {
                value: serde_json::Value::Null,
                variation_index: None,
                reason,
            },
        }
    }

    fn matching_target(&self, flag: &Flag, user: &User) -> Option<usize> {
        flag.targets
            .iter()
            .find(|t| t.values.iter().any(|v| v == &user.key))
            .map(|t| t.variation)
    }

    fn resolve_variation_or_rollout(
        &self,
        flag: &Flag,
        vor: &VariationOrRollout,
        user: &User,
        reason: Reason,
        default: &serde_json::Value,
    ) -> EvaluationDetail {
        let index = if let Some(v) = vor.variation {
            Some(v)
        } else if let Some(rollout) = &vor.rollout {
            self.rollout_variation(flag, rollout, user)
        } else {
            None
        };
        match index {
            Some(index) => self.variation_result(flag, index, reason, default),
            None => EvaluationDetail::error(EvalErrorKind::MalformedFlag, default.clone()),
        }
    }

    fn rollout_variation(&self, flag: &Flag, rollout: &Rollout, user: &User) -> Option<usize> {
        if rollout.variations.is_empty() {
            return None;
        }
        let bucket_value = bucketing::bucket(&flag.key, &flag.salt, user, rollout.bucket_by.as_deref());
        let mut cumulative = 0f64;
        let mut last_variation = None;
        for wv in &rollout.variations {
            cumulative += wv.weight as f64 / 100_000f64;
            last_variation = Some(wv.variation);
            if bucket_value < cumulative {
                return Some(wv.variation);
            }
        }
        // weights summed to < 100_000 (rounding or data error): the last
        // bucket absorbs the overflow, per spec.md §3 invariant.
        last_variation
    }

    fn variation_result(
        &self,
        flag: &Flag,
        index: usize,
        reason: Reason,
        default: &serde_json::Value,
    ) -> EvaluationDetail {
        match flag.variation_value(index) {
            Some(value) => EvaluationDetail {
                value: value.clone(),
                variation_index: Some(index),
                reason,
            },
            None => EvaluationDetail::error(EvalErrorKind::MalformedFlag, default.clone()),
        }
    }

    async fn rule_matches(&self, rule: &crate::model::Rule, user: &User) -> Result<bool, EvalErrorKind> {
        for clause in &rule.clauses {
            if !self.clause_matches(clause, user).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clause_matches<'a>(
        &'a self,
        clause: &'a Clause,
        user: &'a User,
    ) -> BoxFuture<'a, Result<bool, EvalErrorKind>> {
        async move {
            if clause.op == Operator::SegmentMatch {
                for value in &clause.values {
                    if let Some(segment_key) = value.as_str() {
                        if self.segment_matches(segment_key, user).await? {
                            return Ok(!clause.negate);
                        }
                    }
                }
                return Ok(clause.negate);
            }

            let attribute_value = match user.attribute(&clause.attribute) {
                Some(v) => v,
                None => return Ok(clause.negate),
            };

            let matched = if let Some(values) = attribute_value.as_array() {
                values
                    .iter()
                    .any(|v| clause.values.iter().any(|literal| operators::matches(clause.op, v, literal)))
            } else {
                clause
                    .values
                    .iter()
                    .any(|literal| operators::matches(clause.op, &attribute_value, literal))
            };
            Ok(matched ^ clause.negate)
        }
        .boxed()
    }

    async fn segment_matches(&self, segment_key: &str, user: &User) -> Result<bool, EvalErrorKind> {
        let item = self
            .store
            .get(Kind::SEGMENTS, segment_key)
            .await
            .map_err(|_| EvalErrorKind::Exception)?;
        let item = match item {
            Some(item) => item,
            None => return Ok(false),
        };
        let segment: Segment = item.parse().map_err(|_| EvalErrorKind::MalformedFlag)?;

        if segment.excluded.contains(&user.key) {
            return Ok(false);
        }
        if segment.included.contains(&user.key) {
            return Ok(true);
        }

        for rule in &segment.rules {
            let mut all_match = true;
            for clause in &rule.clauses {
                if !self.clause_matches(clause, user).await? {
                    all_match = false;
                    break;
                }
            }
            if !all_match {
                continue;
            }
            return Ok(match rule.weight {
                Some(weight) => {
                    let bucket_value =
                        bucketing::bucket(&segment.key, &segment.salt, user, rule.bucket_by.as_deref());
                    bucket_value < (weight as f64 / 100_000f64)
                }
                None => true,
            });
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::{put_flag, put_segment, FlagBuilder, SegmentBuilder};
    use std::sync::Arc;

    // Scenario 1, spec.md §8: a flag that is off always returns its off
    // variation, and never consults targets, rules or fallthrough.
    #[tokio::test]
    async fn off_flag_returns_off_variation() {
        let store = Arc::new(MemoryStore::new());
        let flag = FlagBuilder::new()
            .off()
            .with_variations(["red", "green"])
            .with_off_variation(1)
            .with_fallthrough_variation(0)
            .add_target(0, "alice")
            .into_inner();
        put_flag(&store, &flag).await;

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &User::new("alice"), serde_json::json!(null))
            .await;

        assert_eq!(outcome.detail.value, serde_json::json!("green"));
        assert_eq!(outcome.detail.variation_index, Some(1));
        assert_eq!(outcome.detail.reason, Reason::Off);
        assert!(outcome.prerequisite_events.is_empty());
    }

    // Scenario 2, spec.md §8: an exact target match wins over whatever
    // the rules or fallthrough would otherwise have picked.
    #[tokio::test]
    async fn target_match_short_circuits_rules() {
        let store = Arc::new(MemoryStore::new());
        let flag = FlagBuilder::new()
            .with_variations(["A", "B", "C"])
            .with_fallthrough_variation(2)
            .add_target(0, "alice")
            .into_inner();
        put_flag(&store, &flag).await;

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &User::new("alice"), serde_json::json!(null))
            .await;

        assert_eq!(outcome.detail.value, serde_json::json!("A"));
        assert_eq!(outcome.detail.variation_index, Some(0));
        assert_eq!(outcome.detail.reason, Reason::TargetMatch);

        // a user that isn't targeted still falls through normally
        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &User::new("bob"), serde_json::json!(null))
            .await;
        assert_eq!(outcome.detail.variation_index, Some(2));
        assert_eq!(outcome.detail.reason, Reason::Fallthrough);
    }

    // Scenario 3, spec.md §8: a failing prerequisite returns the flag's
    // off variation (not MALFORMED_FLAG, not the prerequisite's value) and
    // an event is emitted for the prerequisite itself.
    #[tokio::test]
    async fn prerequisite_failure_returns_off_variation_and_emits_event() {
        let store = Arc::new(MemoryStore::new());
        let child = FlagBuilder::new()
            .with_key("child-flag")
            .with_variations(["child-off", "child-on"])
            .with_off_variation(0)
            .with_fallthrough_variation(0)
            .into_inner();
        put_flag(&store, &child).await;

        let parent = FlagBuilder::new()
            .with_key("parent-flag")
            .with_variations(["parent-off", "parent-on"])
            .with_off_variation(0)
            .with_fallthrough_variation(1)
            .with_prerequisites(vec![crate::model::Prerequisite {
                key: "child-flag".into(),
                // child's fallthrough resolves to 0, not 1: prerequisite fails
                variation: 1,
            }])
            .into_inner();
        put_flag(&store, &parent).await;

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&parent.key, &User::new("alice"), serde_json::json!(null))
            .await;

        assert_eq!(outcome.detail.value, serde_json::json!("parent-off"));
        assert_eq!(
            outcome.detail.reason,
            Reason::PrerequisiteFailed {
                prerequisite_key: "child-flag".into()
            }
        );
        assert_eq!(outcome.prerequisite_events.len(), 1);
        let event = &outcome.prerequisite_events[0];
        assert_eq!(event.flag_key, "child-flag");
        assert_eq!(event.prerequisite_of, "parent-flag");
        assert_eq!(event.variation_index, Some(0));
    }

    // Scenario 4, spec.md §8: a rollout always resolves the same user to
    // the same variation, and the distribution over many distinct users
    // converges toward the configured weights.
    #[tokio::test]
    async fn rollout_variation_selection_is_deterministic_and_respects_weights() {
        let store = Arc::new(MemoryStore::new());
        let flag = FlagBuilder::new()
            .with_variations(["A", "B"])
            .with_fallthrough_rollout([(0, 60_000), (1, 40_000)])
            .into_inner();
        put_flag(&store, &flag).await;
        let evaluator = Evaluator::new(Arc::clone(&store));

        let user = User::new("stable-user");
        let first = evaluator.evaluate(&flag.key, &user, serde_json::json!(null)).await;
        let second = evaluator.evaluate(&flag.key, &user, serde_json::json!(null)).await;
        assert_eq!(first.detail.variation_index, second.detail.variation_index);

        let mut counts = [0u32; 2];
        for i in 0..300 {
            let user = User::new(format!("user-{i}"));
            let outcome = evaluator.evaluate(&flag.key, &user, serde_json::json!(null)).await;
            match outcome.detail.variation_index {
                Some(idx) => counts[idx] += 1,
                None => panic!("rollout must always resolve a variation"),
            }
        }
        let proportion_a = counts[0] as f64 / 300.0;
        assert!(
            (0.45..0.75).contains(&proportion_a),
            "expected roughly 60% variation A, got {proportion_a}"
        );
    }

    #[tokio::test]
    async fn fallthrough() {
        let store = Arc::new(MemoryStore::new());
        let flag = FlagBuilder::new()
            .with_variations([false, true])
            .with_fallthrough_variation(1)
            .into_inner();
        put_flag(&store, &flag).await;

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &User::new("anyone"), serde_json::json!(false))
            .await;

        assert_eq!(outcome.detail.value, serde_json::json!(true));
        assert_eq!(outcome.detail.variation_index, Some(1));
        assert_eq!(outcome.detail.reason, Reason::Fallthrough);
    }

    #[tokio::test]
    async fn targeting() {
        let store = Arc::new(MemoryStore::new());
        let flag = FlagBuilder::new()
            .with_variations([false, true])
            .with_fallthrough_variation(0)
            .add_target(1, "targeted-user")
            .into_inner();
        put_flag(&store, &flag).await;

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &User::new("targeted-user"), serde_json::json!(false))
            .await;

        assert_eq!(outcome.detail.value, serde_json::json!(true));
        assert_eq!(outcome.detail.reason, Reason::TargetMatch);
    }

    #[tokio::test]
    async fn fallthrough_rollout() {
        let store = Arc::new(MemoryStore::new());
        let flag = FlagBuilder::new()
            .with_variations(["A", "B", "C"])
            .with_fallthrough_rollout([(0, 50_000), (1, 30_000), (2, 20_000)])
            .into_inner();
        put_flag(&store, &flag).await;
        let user = User::new("rollout-user");

        let bucket = bucketing::bucket(&flag.key, &flag.salt, &user, None);
        let expected = if bucket < 0.5 {
            0
        } else if bucket < 0.8 {
            1
        } else {
            2
        };

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &user, serde_json::json!(null))
            .await;
        assert_eq!(outcome.detail.variation_index, Some(expected));
        assert_eq!(outcome.detail.reason, Reason::Fallthrough);
    }

    // Malformed-flag cycle guard, also exercised here since it shares the
    // prerequisite-walking machinery scenario 3 depends on.
    #[tokio::test]
    async fn prerequisite_cycle_is_malformed_flag() {
        let store = Arc::new(MemoryStore::new());
        let a = FlagBuilder::new()
            .with_key("a")
            .with_variations([false, true])
            .with_fallthrough_variation(1)
            .with_prerequisites(vec![crate::model::Prerequisite {
                key: "b".into(),
                variation: 1,
            }])
            .into_inner();
        let b = FlagBuilder::new()
            .with_key("b")
            .with_variations([false, true])
            .with_fallthrough_variation(1)
            .with_prerequisites(vec![crate::model::Prerequisite {
                key: "a".into(),
                variation: 1,
            }])
            .into_inner();
        put_flag(&store, &a).await;
        put_flag(&store, &b).await;

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate("a", &User::new("anyone"), serde_json::json!(null))
            .await;
        assert!(outcome.detail.is_error());
        assert!(matches!(
            outcome.detail.reason,
            Reason::Error {
                error_kind: EvalErrorKind::MalformedFlag
            }
        ));
    }

    // spec.md §4.1 "Segment match": a clause referencing a segment
    // delegates to the segment's included/excluded sets and rules.
    #[tokio::test]
    async fn segment_match_clause_defers_to_segment_membership() {
        let store = Arc::new(MemoryStore::new());
        let segment = SegmentBuilder::new()
            .with_key("beta-users")
            .included(["alice"])
            .into_inner();
        put_segment(&store, &segment).await;

        let rule = crate::model::Rule {
            id: "rule-1".into(),
            clauses: vec![Clause {
                attribute: "key".into(),
                op: Operator::SegmentMatch,
                values: vec![serde_json::json!("beta-users")],
                negate: false,
            }],
            variation_or_rollout: VariationOrRollout {
                variation: Some(1),
                rollout: None,
            },
            track_events: false,
        };
        let flag = FlagBuilder::new()
            .with_variations([false, true])
            .with_fallthrough_variation(0)
            .with_rules(vec![rule])
            .into_inner();
        put_flag(&store, &flag).await;

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &User::new("alice"), serde_json::json!(false))
            .await;
        assert_eq!(outcome.detail.value, serde_json::json!(true));

        let outcome = Evaluator::new(Arc::clone(&store))
            .evaluate(&flag.key, &User::new("bob"), serde_json::json!(false))
            .await;
        assert_eq!(outcome.detail.value, serde_json::json!(false));
    }
}
