//! Layered option resolution.
//!
//! Options are JSON values keyed by camel-cased names. A field resolves a key
//! through its own layers first (programmatic overrides, then attributes),
//! then through its form's layers, then through the engine defaults:
//!
//! ```text
//! resolve(key) = field[key] ?? form[key] ?? defaults[key]
//! ```
//!
//! Attribute text is deserialised the way requirement objects are:
//! `true`/`false`/`null`, numbers, and `[`/`{` JSON literals become typed
//! values, anything else stays a string.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value::Whitespace;

/// Option keys understood by the engine itself. A validator may not be
/// registered under one of these names.
pub const RESERVED_KEYS: &[&str] = &[
    "namespace",
    "inputs",
    "excluded",
    "priorityEnabled",
    "multiple",
    "group",
    "focus",
    "noFocus",
    "whitespace",
    "trimValue",
    "value",
    "validateIfEmpty",
    "errorMessage",
];

// ============================================================================
// DEFAULTS
// ============================================================================

/// Which invalid field receives focus after a failed form validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusPolicy {
    /// The first invalid field in document order.
    #[default]
    First,
    /// The last invalid field in document order.
    Last,
    /// Never move focus.
    #[serde(rename = "none")]
    Disabled,
}

impl FocusPolicy {
    /// Reads the policy from an option value; unknown values disable focus.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("first") | None => Self::First,
            Some("last") => Self::Last,
            Some(_) => Self::Disabled,
        }
    }
}

/// Engine-wide defaults, the bottom option layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Defaults {
    /// Attribute prefix stripped from configuration attributes.
    pub namespace: String,
    /// Selector list of controls a form binds.
    pub inputs: String,
    /// Selector list of controls a form never binds.
    pub excluded: String,
    /// Group constraints by priority and stop at the first failing group.
    pub priority_enabled: bool,
    /// Group identity for radio/checkbox/multi-select fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple: Option<String>,
    /// Validation group membership; a string or an array of strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Value>,
    /// Focus policy after a failed form validation.
    pub focus: FocusPolicy,
    /// Whitespace handling applied to single values.
    pub whitespace: Whitespace,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            namespace: "data-parsley-".to_owned(),
            inputs: "input, textarea, select".to_owned(),
            excluded: "input[type=button], input[type=submit], input[type=reset], input[type=hidden]".to_owned(),
            priority_enabled: true,
            multiple: None,
            group: None,
            focus: FocusPolicy::First,
            whitespace: Whitespace::Keep,
        }
    }
}

impl Defaults {
    /// Serialises the defaults into an option layer.
    pub fn to_layer(&self) -> OptionLayer {
        match serde_json::to_value(self) {
            Ok(Value::Object(values)) => OptionLayer { values },
            _ => OptionLayer::default(),
        }
    }
}

// ============================================================================
// LAYERS
// ============================================================================

/// One level of options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionLayer {
    values: Map<String, Value>,
}

impl OptionLayer {
    /// Empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every attribute starting with `namespace`, strips the prefix,
    /// camel-cases the rest and deserialises the value.
    pub fn from_attributes<I, K, V>(namespace: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let values = attributes
            .into_iter()
            .filter_map(|(name, value)| {
                let key = name.as_ref().strip_prefix(namespace)?;
                (!key.is_empty()).then(|| (camelize(key), deserialize_value(value.as_ref())))
            })
            .collect();
        Self { values }
    }

    /// Builder: sets one option.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets one option.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Removes one option.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Reads one option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Copies every option of `other` over this layer.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Keys in this layer.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `true` when the layer holds nothing.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for OptionLayer {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for OptionLayer {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A resolution chain of layers, most specific first.
#[derive(Debug, Clone, Default)]
pub struct Options {
    layers: Vec<Arc<OptionLayer>>,
}

impl Options {
    /// Builds a chain from most to least specific.
    pub fn new(layers: impl IntoIterator<Item = Arc<OptionLayer>>) -> Self {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// The first layer holding `key`.
    pub fn resolve(&self, key: &str) -> Option<&Value> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    /// `true` when any layer holds `key`, even with a `null` value.
    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    /// A string option. Numbers and booleans are rendered.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.resolve(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// A boolean option; strings other than `"false"` count as set.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.resolve(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s != "false"),
            Value::Null => Some(false),
            _ => Some(true),
        }
    }

    /// An integer option.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.resolve(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Every key across all layers, sorted.
    pub fn keys(&self) -> BTreeSet<&str> {
        self.layers.iter().flat_map(|layer| layer.keys()).collect()
    }

    /// The most specific layer.
    pub fn own(&self) -> Option<&OptionLayer> {
        self.layers.first().map(AsRef::as_ref)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// `priority-enabled` → `priorityEnabled`.
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' || ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Interprets attribute text: `true`, `false`, `null`, numbers and JSON
/// literals become typed values; unparseable JSON and everything else stay
/// strings.
pub fn deserialize_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::from(i);
        }
        if let Ok(f) = trimmed.parse::<f64>()
            && f.is_finite()
            && let Some(n) = serde_json::Number::from_f64(f)
        {
            return Value::Number(n);
        }
    }
    if raw.starts_with(['[', '{', '"'])
        && let Ok(parsed) = serde_json::from_str(raw)
    {
        return parsed;
    }
    Value::String(raw.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("true", json!(true))]
    #[case("false", json!(false))]
    #[case("null", json!(null))]
    #[case("42", json!(42))]
    #[case(" 2.5 ", json!(2.5))]
    #[case("[3, 7]", json!([3, 7]))]
    #[case("{\"type\": \"POST\"}", json!({"type": "POST"}))]
    #[case("[oops", json!("[oops"))]
    #[case("\"true\"", json!("true"))]
    #[case("", json!(""))]
    #[case("hello", json!("hello"))]
    fn attribute_text_is_deserialised(#[case] raw: &str, #[case] expected: Value) {
        assert_eq!(deserialize_value(raw), expected);
    }

    #[rstest]
    #[case("priority-enabled", "priorityEnabled")]
    #[case("remote-validator", "remoteValidator")]
    #[case("required", "required")]
    #[case("min_length", "minLength")]
    fn names_are_camelized(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(camelize(raw), expected);
    }

    #[test]
    fn attributes_outside_the_namespace_are_ignored() {
        let layer = OptionLayer::from_attributes(
            "data-parsley-",
            [
                ("data-parsley-minlength", "3"),
                ("data-parsley-trigger", "change"),
                ("data-parsley-", "x"),
                ("class", "wide"),
            ],
        );
        assert_eq!(layer.get("minlength"), Some(&json!(3)));
        assert_eq!(layer.get("trigger"), Some(&json!("change")));
        assert_eq!(layer.keys().count(), 2);
    }

    #[test]
    fn resolution_prefers_the_most_specific_layer() {
        let field = Arc::new(OptionLayer::new().with("focus", "last"));
        let form = Arc::new(OptionLayer::new().with("focus", "none").with("group", "a"));
        let defaults = Arc::new(Defaults::default().to_layer());
        let options = Options::new([field, form, defaults]);

        assert_eq!(options.string("focus").as_deref(), Some("last"));
        assert_eq!(options.string("group").as_deref(), Some("a"));
        assert_eq!(options.string("namespace").as_deref(), Some("data-parsley-"));
        assert_eq!(options.flag("priorityEnabled"), Some(true));
        assert!(!options.contains("multiple"));
        assert!(options.keys().contains("inputs"));
    }

    #[test]
    fn defaults_round_trip_through_serde() {
        let defaults: Defaults = serde_json::from_value(json!({"focus": "none", "whitespace": "squish"})).unwrap();
        assert_eq!(defaults.focus, FocusPolicy::Disabled);
        assert_eq!(defaults.whitespace, Whitespace::Squish);
        assert_eq!(defaults.namespace, "data-parsley-");
        assert_eq!(defaults.to_layer().get("priorityEnabled"), Some(&json!(true)));
    }

    #[test]
    fn focus_policy_reads_option_values() {
        assert_eq!(FocusPolicy::from_value(None), FocusPolicy::First);
        assert_eq!(FocusPolicy::from_value(Some(&json!("last"))), FocusPolicy::Last);
        assert_eq!(FocusPolicy::from_value(Some(&json!("none"))), FocusPolicy::Disabled);
    }
}
