use serde::Serialize;

/// Why an evaluation produced the value it did, spec.md §3.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Reason {
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "FALLTHROUGH")]
    Fallthrough,
    #[serde(rename = "TARGET_MATCH")]
    TargetMatch,
    #[serde(rename = "RULE_MATCH")]
    RuleMatch { rule_index: usize, rule_id: String },
    #[serde(rename = "PREREQUISITE_FAILED")]
    PrerequisiteFailed { prerequisite_key: String },
    #[serde(rename = "ERROR")]
    Error { error_kind: EvalErrorKind },
}

/// Sub-kind of [`Reason::Error`], spec.md §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvalErrorKind {
    ClientNotReady,
    FlagNotFound,
    MalformedFlag,
    UserNotSpecified,
    WrongType,
    Exception,
}

/// Full result of evaluating a flag for a user: the value, which
/// variation index produced it (`None` for off-with-no-offVariation and
/// for errors), and the [`Reason`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationDetail {
    pub value: serde_json::Value,
    pub variation_index: Option<usize>,
    pub reason: Reason,
}

impl EvaluationDetail {
    pub fn error(kind: EvalErrorKind, default: serde_json::Value) -> Self {
        Self {
            value: default,
            variation_index: None,
            reason: Reason::Error { error_kind: kind },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.reason, Reason::Error { .. })
    }
}
