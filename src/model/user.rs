use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A user attribute value.
///
/// LaunchDarkly attributes are loosely typed JSON; we keep this as a thin
/// wrapper over [`serde_json::Value`] rather than `Value` itself so clause
/// matching (`evaluator::operators`) has a single place to implement
/// coercions (numeric, string, array-of-scalars) instead of matching on
/// `Value` variants at every call site.
pub type AttributeValue = serde_json::Value;

/// A user (or "context", in newer LaunchDarkly terminology) being evaluated
/// against a flag.
///
/// Only `key` is required; everything else is optional per spec.md §3.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct User {
    pub key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, AttributeValue>,

    /// Names of attributes that should not leave the SDK in analytics
    /// events. Evaluation itself still reads them.
    #[serde(rename = "privateAttributeNames", default, skip_serializing_if = "HashSet::is_empty")]
    pub private_attribute_names: HashSet<String>,
}

impl User {
    /// Create a user from just a key, matching the teacher's original
    /// `User::new` ergonomics but owning the key (the evaluator now needs
    /// to hold users across an `await` point and recurse through
    /// prerequisites, which borrowed keys made awkward).
    pub fn new<K: Into<String>>(key: K) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Fetch a standard or custom attribute by name, used by clause
    /// matching and bucketing. `"key"` and `"secondary"` resolve to the
    /// dedicated fields rather than `custom`.
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "key" => Some(serde_json::Value::String(self.key.clone())),
            "secondary" => self.secondary.clone().map(serde_json::Value::String),
            "ip" => self.ip.clone().map(serde_json::Value::String),
            "country" => self.country.clone().map(serde_json::Value::String),
            "email" => self.email.clone().map(serde_json::Value::String),
            "name" => self.name.clone().map(serde_json::Value::String),
            "avatar" => self.avatar.clone().map(serde_json::Value::String),
            "firstName" => self.first_name.clone().map(serde_json::Value::String),
            "lastName" => self.last_name.clone().map(serde_json::Value::String),
            "anonymous" => self.anonymous.map(serde_json::Value::Bool),
            other => self.custom.get(other).cloned(),
        }
    }

    pub fn is_private(&self, name: &str) -> bool {
        self.private_attribute_names.contains(name)
    }

    pub fn with_custom<K: Into<String>, V: Into<AttributeValue>>(mut self, key: K, value: V) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn with_secondary<S: Into<String>>(mut self, secondary: S) -> Self {
        self.secondary = Some(secondary.into());
        self
    }
}
