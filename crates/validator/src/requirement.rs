//! Requirement schemas and typed requirement values.
//!
//! Every validator declares the shape of the argument it expects: a single
//! scalar, a fixed-length tuple, or a keyed map with a main value plus named
//! extras read from sibling options. Raw requirements arrive either as
//! strings (attribute text) or as already-typed JSON values (programmatic
//! configuration); both are converted into [`Requirements`].

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::{ConfigError, ConfigResult};
use crate::markup::Control;
use crate::options::deserialize_value;
use crate::value::FieldValue;

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^\s*\[(.*)\]\s*$").unwrap());
static REGEXP_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^/(.*)/([gimy]*)$").unwrap());

// ============================================================================
// CONTEXT
// ============================================================================

/// What a requirement parser may ask of the field it is parsing for.
pub trait RequirementContext {
    /// Reads a sibling option, e.g. `typeStep` for the `step` extra of `type`.
    fn extra_option(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Resolves a selector for `reference` requirements.
    fn lookup(&self, _selector: &str) -> ConfigResult<Option<Arc<dyn Control>>> {
        Ok(None)
    }
}

/// A context with no options and nothing to reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl RequirementContext for Detached {}

// ============================================================================
// SCHEMA
// ============================================================================

/// Scalar requirement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    /// Kept verbatim.
    String,
    /// Parsed as a number and truncated toward zero.
    Integer,
    /// Parsed as a finite float.
    Number,
    /// `false` only for the literal `"false"`.
    Boolean,
    /// A regular expression, plain (anchored) or `/pattern/flags`.
    Regexp,
    /// Any JSON-ish value.
    Object,
    /// A selector resolved to another control.
    Reference,
}

impl RequirementKind {
    /// Lower-case name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Regexp => "regexp",
            Self::Object => "object",
            Self::Reference => "reference",
        }
    }

    /// Converts a raw requirement string.
    pub fn parse(self, raw: &str, ctx: &dyn RequirementContext) -> ConfigResult<Requirement> {
        Ok(match self {
            Self::String => Requirement::String(raw.to_owned()),
            Self::Integer => {
                let number = parse_finite(raw).ok_or_else(|| ConfigError::NotAnInteger(raw.to_owned()))?;
                #[allow(clippy::cast_possible_truncation)]
                Requirement::Integer(number.trunc() as i64)
            }
            Self::Number => Requirement::Number(parse_finite(raw).ok_or_else(|| ConfigError::NotANumber(raw.to_owned()))?),
            Self::Boolean => Requirement::Boolean(raw != "false"),
            Self::Regexp => Requirement::Regexp(Pattern::parse(raw)?),
            Self::Object => Requirement::Object(deserialize_value(raw)),
            Self::Reference => {
                let control = ctx
                    .lookup(raw)?
                    .ok_or_else(|| ConfigError::NoSuchReference(raw.to_owned()))?;
                Requirement::Reference(Reference {
                    selector: raw.to_owned(),
                    control,
                })
            }
        })
    }

    /// Converts an already-typed value. Strings go through [`parse`](Self::parse).
    pub fn coerce(self, value: &Value, ctx: &dyn RequirementContext) -> ConfigResult<Requirement> {
        let mismatch = || ConfigError::RequirementType {
            expected: self.name(),
            value: value.to_string(),
        };
        match (self, value) {
            (_, Value::String(s)) if self != Self::Object => self.parse(s, ctx),
            (Self::Object, v) => Ok(Requirement::Object(match v {
                Value::String(s) => deserialize_value(s),
                other => other.clone(),
            })),
            (Self::String, Value::Number(n)) => Ok(Requirement::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Ok(Requirement::String(b.to_string())),
            (Self::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    #[allow(clippy::cast_possible_truncation)]
                    n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
                })
                .map(Requirement::Integer)
                .ok_or_else(mismatch),
            (Self::Number, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(Requirement::Number)
                .ok_or_else(mismatch),
            (Self::Boolean, Value::Bool(b)) => Ok(Requirement::Boolean(*b)),
            (Self::Boolean, Value::Null) => Ok(Requirement::Boolean(false)),
            (Self::Boolean, Value::Number(n)) => Ok(Requirement::Boolean(n.as_f64() != Some(0.0))),
            _ => Err(mismatch()),
        }
    }
}

/// The requirement shape a validator declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementType {
    /// One scalar.
    Single(RequirementKind),
    /// A bracketed, comma-separated list of exactly this many scalars.
    Tuple(SmallVec<[RequirementKind; 2]>),
    /// A main value plus named extras read from `<validator><Key>` options.
    Keyed {
        /// Kind of the main value.
        main: RequirementKind,
        /// Extras in declaration order.
        extras: Vec<(String, RequirementKind)>,
    },
}

impl Default for RequirementType {
    fn default() -> Self {
        Self::Single(RequirementKind::String)
    }
}

impl From<RequirementKind> for RequirementType {
    fn from(kind: RequirementKind) -> Self {
        Self::Single(kind)
    }
}

impl RequirementType {
    /// Tuple shorthand.
    pub fn tuple(kinds: impl IntoIterator<Item = RequirementKind>) -> Self {
        Self::Tuple(kinds.into_iter().collect())
    }

    /// Keyed shorthand.
    pub fn keyed<K: Into<String>>(main: RequirementKind, extras: impl IntoIterator<Item = (K, RequirementKind)>) -> Self {
        Self::Keyed {
            main,
            extras: extras.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Parses a raw requirement for the validator called `name`.
    pub fn parse(&self, name: &str, raw: &Value, ctx: &dyn RequirementContext) -> ConfigResult<Requirements> {
        match self {
            Self::Single(kind) => kind.coerce(raw, ctx).map(Requirements::Single),
            Self::Tuple(kinds) => {
                let values = match raw {
                    Value::String(s) => {
                        let parts = split_bracketed(s)?;
                        check_arity(parts.len(), kinds.len())?;
                        parts
                            .iter()
                            .zip(kinds)
                            .map(|(v, kind)| kind.parse(v, ctx))
                            .collect::<ConfigResult<SmallVec<_>>>()?
                    }
                    Value::Array(items) => {
                        check_arity(items.len(), kinds.len())?;
                        items
                            .iter()
                            .zip(kinds)
                            .map(|(v, kind)| kind.coerce(v, ctx))
                            .collect::<ConfigResult<SmallVec<_>>>()?
                    }
                    other => return Err(ConfigError::NotAnArray(other.to_string())),
                };
                Ok(Requirements::Tuple(values))
            }
            Self::Keyed { main, extras } => {
                // Already-parsed `[main, {extras}]` pairs bypass the option reader.
                if let Value::Array(pair) = raw
                    && let [head, Value::Object(given)] = pair.as_slice()
                {
                    let main = main.coerce(head, ctx)?;
                    let extras = extras
                        .iter()
                        .filter_map(|(key, kind)| given.get(key).map(|v| (key, kind, v)))
                        .map(|(key, kind, v)| Ok((key.clone(), kind.coerce(v, ctx)?)))
                        .collect::<ConfigResult<Vec<_>>>()?;
                    return Ok(Requirements::Keyed {
                        main: Box::new(main),
                        extras,
                    });
                }

                let main = main.coerce(raw, ctx)?;
                let mut parsed = Vec::with_capacity(extras.len());
                for (key, kind) in extras {
                    if let Some(value) = ctx.extra_option(&extra_option_name(name, key)) {
                        parsed.push((key.clone(), kind.coerce(&value, ctx)?));
                    }
                }
                Ok(Requirements::Keyed {
                    main: Box::new(main),
                    extras: parsed,
                })
            }
        }
    }
}

/// `remote` + `validator` → `remoteValidator`.
pub fn extra_option_name(name: &str, key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("{name}{}{}", first.to_uppercase(), chars.as_str()),
        None => name.to_owned(),
    }
}

fn split_bracketed(raw: &str) -> ConfigResult<Vec<&str>> {
    let inner = BRACKETED
        .captures(raw)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ConfigError::NotAnArray(raw.to_owned()))?;
    Ok(inner.as_str().split(',').map(str::trim).collect())
}

const fn check_arity(found: usize, expected: usize) -> ConfigResult<()> {
    if found == expected {
        Ok(())
    } else {
        Err(ConfigError::ArityMismatch { found, expected })
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

// ============================================================================
// VALUES
// ============================================================================

/// A compiled regular expression that remembers how it was written.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    regex: Regex,
}

impl Pattern {
    /// Parses `/pattern/flags` or a plain pattern, which is anchored.
    ///
    /// Only the `i` and `m` flags change matching; `g` and `y` are accepted
    /// and dropped.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        match REGEXP_LITERAL.captures(raw) {
            Some(captures) => {
                let source = captures.get(1).map_or("", |m| m.as_str());
                let flags = captures.get(2).map_or("", |m| m.as_str());
                Self::new(source, flags)
            }
            None => Self::new(&format!("^{raw}$"), ""),
        }
    }

    /// Compiles `source` with the given flags.
    pub fn new(source: &str, flags: &str) -> ConfigResult<Self> {
        let mut kept = String::new();
        for flag in ['i', 'm'] {
            if flags.contains(flag) {
                kept.push(flag);
            }
        }
        let compiled = if kept.is_empty() {
            source.to_owned()
        } else {
            format!("(?{kept}){source}")
        };
        let regex = Regex::new(&compiled).map_err(|e| ConfigError::InvalidPattern {
            pattern: source.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_owned(),
            flags: kept,
            regex,
        })
    }

    /// The pattern text, anchors included.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Effective flags (`i`, `m`).
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Tests a value.
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({self})")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// A resolved `reference` requirement.
#[derive(Clone)]
pub struct Reference {
    selector: String,
    control: Arc<dyn Control>,
}

impl Reference {
    /// The selector as written.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// The referenced control.
    pub fn control(&self) -> &Arc<dyn Control> {
        &self.control
    }

    /// Current value of the referenced control.
    pub fn value(&self) -> FieldValue {
        self.control.value()
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.selector == other.selector && self.control.id() == other.control.id()
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("selector", &self.selector)
            .field("control", &self.control.id())
            .finish()
    }
}

/// One typed requirement value.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// Verbatim string.
    String(String),
    /// Integer.
    Integer(i64),
    /// Finite float.
    Number(f64),
    /// Boolean.
    Boolean(bool),
    /// Compiled pattern.
    Regexp(Pattern),
    /// Deserialised value.
    Object(Value),
    /// Another control.
    Reference(Reference),
}

impl Requirement {
    /// The string, for `String` requirements.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, also accepting integral numbers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    /// Any numeric requirement as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The pattern.
    pub fn as_pattern(&self) -> Option<&Pattern> {
        match self {
            Self::Regexp(p) => Some(p),
            _ => None,
        }
    }

    /// The reference.
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// The object value.
    pub fn as_object(&self) -> Option<&Value> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Regexp(p) => write!(f, "{p}"),
            // Strings that would deserialise as something else are quoted.
            Self::Object(Value::String(s)) if deserialize_value(s) == Value::String(s.clone()) => f.write_str(s),
            Self::Object(v) => write!(f, "{v}"),
            Self::Reference(r) => f.write_str(&r.selector),
        }
    }
}

/// Parsed requirements of one constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirements {
    /// A scalar requirement.
    Single(Requirement),
    /// A fixed-length tuple.
    Tuple(SmallVec<[Requirement; 2]>),
    /// A main value plus extras, in declaration order.
    Keyed {
        /// Main value.
        main: Box<Requirement>,
        /// Extras that were present.
        extras: Vec<(String, Requirement)>,
    },
}

impl Requirements {
    /// The scalar, the first tuple element or the main value.
    pub fn first(&self) -> Option<&Requirement> {
        match self {
            Self::Single(r) => Some(r),
            Self::Tuple(values) => values.first(),
            Self::Keyed { main, .. } => Some(main),
        }
    }

    /// Positional access. Index 0 of a keyed requirement is the main value.
    pub fn get(&self, index: usize) -> Option<&Requirement> {
        match self {
            Self::Tuple(values) => values.get(index),
            _ if index == 0 => self.first(),
            _ => None,
        }
    }

    /// A named extra of a keyed requirement.
    pub fn extra(&self, key: &str) -> Option<&Requirement> {
        match self {
            Self::Keyed { extras, .. } => extras.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Every value in message-formatting order: main first, then extras.
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        let (head, rest): (&[Requirement], &[(String, Requirement)]) = match self {
            Self::Single(r) => (std::slice::from_ref(r), &[]),
            Self::Tuple(values) => (values.as_slice(), &[]),
            Self::Keyed { main, extras } => (std::slice::from_ref(main.as_ref()), extras.as_slice()),
        };
        head.iter().chain(rest.iter().map(|(_, v)| v))
    }

    /// Number of values, extras included.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// `true` for an empty tuple.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(r) => write!(f, "{r}"),
            Self::Tuple(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Keyed { main, .. } => write!(f, "{main}"),
        }
    }
}
