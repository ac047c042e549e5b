//! Field values and whitespace handling.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RUNS_OF_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// The value extracted from a field: a single string for most controls, a
/// list for checkbox groups and multi-selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single control value.
    Single(String),
    /// Checked/selected values of a multi-valued field.
    Multiple(Vec<String>),
}

impl FieldValue {
    /// `true` when the string is empty or the list has no entries.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(s) => s.is_empty(),
            Self::Multiple(v) => v.is_empty(),
        }
    }

    /// Borrows the single value, if this is one.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s),
            Self::Multiple(_) => None,
        }
    }

    /// Borrows the list, if this is a multi value.
    pub fn as_multiple(&self) -> Option<&[String]> {
        match self {
            Self::Single(_) => None,
            Self::Multiple(v) => Some(v),
        }
    }

    pub(crate) fn apply_whitespace(self, policy: Whitespace) -> Self {
        match self {
            Self::Single(s) => Self::Single(policy.apply(&s)),
            Self::Multiple(v) => Self::Multiple(v.iter().map(|s| policy.apply(s)).collect()),
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::Multiple(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(s) => f.write_str(s),
            Self::Multiple(v) => f.write_str(&v.join(",")),
        }
    }
}

/// How leading, trailing and internal whitespace is treated before
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Whitespace {
    /// Leave the value untouched.
    #[default]
    Keep,
    /// Strip leading and trailing whitespace.
    Trim,
    /// Collapse internal runs of whitespace to one space, then trim.
    Squish,
}

impl Whitespace {
    /// Parses the option value; anything unrecognised keeps the value.
    pub fn from_option(value: &str) -> Self {
        match value {
            "trim" => Self::Trim,
            "squish" => Self::Squish,
            _ => Self::Keep,
        }
    }

    /// Applies the policy to one string.
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::Keep => value.to_owned(),
            Self::Trim => value.trim().to_owned(),
            Self::Squish => RUNS_OF_WHITESPACE.replace_all(value, " ").trim().to_owned(),
        }
    }
}
