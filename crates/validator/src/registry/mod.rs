//! Validator registry.
//!
//! A [`Validator`] pairs a requirement schema with up to three checks, one
//! per value shape. The [`ValidatorRegistry`] owns validators by name along
//! with the message [`Catalog`]. Registration problems that the caller can
//! recover from (duplicate names, removing something that is not there) are
//! logged as warnings; everything else is a [`ConfigError`].

mod builtin;
mod catalog;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::constraint::Constraint;
use crate::error::{ConfigError, ConfigResult};
use crate::options::RESERVED_KEYS;
use crate::outcome::Check;
use crate::requirement::{RequirementContext, RequirementType, Requirements};
use crate::value::FieldValue;

pub use builtin::register_builtins;
pub use catalog::{Catalog, DEFAULT_MESSAGE, FALLBACK_LOCALE, format_message};

/// Priority of a validator that does not declare one.
pub const DEFAULT_PRIORITY: i32 = 2;

// ============================================================================
// CHECK CONTEXT
// ============================================================================

/// What a check may know about the field it is checking.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckContext<'a> {
    key: Option<&'a str>,
}

impl<'a> CheckContext<'a> {
    /// Context for a field identified by `key` (its `name`, else `id`).
    pub fn new(key: Option<&'a str>) -> Self {
        Self { key }
    }

    /// The field's `name`, else its `id`.
    pub fn key(&self) -> Option<&'a str> {
        self.key
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

type StringCheck = dyn Fn(&str, &Requirements, &CheckContext<'_>) -> Check + Send + Sync;
type MultipleCheck = dyn Fn(&[String], &Requirements, &CheckContext<'_>) -> Check + Send + Sync;
type NumberCheck = dyn Fn(f64, &Requirements, &CheckContext<'_>) -> Check + Send + Sync;
type RequirementGuard = dyn Fn(&Requirements) -> ConfigResult<()> + Send + Sync;

/// A named check with its requirement schema.
///
/// ```rust,ignore
/// let between = Validator::new("between", RequirementType::tuple([Integer, Integer]))
///     .number(|value, req, _| {
///         let (lo, hi) = (req.get(0).and_then(|r| r.as_f64()), req.get(1).and_then(|r| r.as_f64()));
///         Check::from(lo.is_some_and(|lo| value >= lo) && hi.is_some_and(|hi| value <= hi))
///     })
///     .message("en", "This value should be between %s and %s.");
/// ```
#[derive(Clone)]
pub struct Validator {
    name: String,
    requirement_type: RequirementType,
    priority: i32,
    string: Option<Arc<StringCheck>>,
    multiple: Option<Arc<MultipleCheck>>,
    number: Option<Arc<NumberCheck>>,
    guard: Option<Arc<RequirementGuard>>,
    messages: Vec<(String, String)>,
}

impl Validator {
    /// A validator with no checks yet.
    pub fn new(name: impl Into<String>, requirement_type: impl Into<RequirementType>) -> Self {
        Self {
            name: name.into(),
            requirement_type: requirement_type.into(),
            priority: DEFAULT_PRIORITY,
            string: None,
            multiple: None,
            number: None,
            guard: None,
            messages: Vec::new(),
        }
    }

    /// Default priority of constraints using this validator.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Check for single string values.
    #[must_use]
    pub fn string<F>(mut self, check: F) -> Self
    where
        F: Fn(&str, &Requirements, &CheckContext<'_>) -> Check + Send + Sync + 'static,
    {
        self.string = Some(Arc::new(check));
        self
    }

    /// Check for multi-valued fields.
    #[must_use]
    pub fn multiple<F>(mut self, check: F) -> Self
    where
        F: Fn(&[String], &Requirements, &CheckContext<'_>) -> Check + Send + Sync + 'static,
    {
        self.multiple = Some(Arc::new(check));
        self
    }

    /// Check for numeric values. Empty values pass; values that do not
    /// parse go to the string check when there is one and fail otherwise.
    #[must_use]
    pub fn number<F>(mut self, check: F) -> Self
    where
        F: Fn(f64, &Requirements, &CheckContext<'_>) -> Check + Send + Sync + 'static,
    {
        self.number = Some(Arc::new(check));
        self
    }

    /// Extra validation of parsed requirements, run at parse time.
    #[must_use]
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Requirements) -> ConfigResult<()> + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// A catalog message added on registration.
    #[must_use]
    pub fn message(mut self, locale: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.push((locale.into(), message.into()));
        self
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requirement schema.
    pub fn requirement_type(&self) -> &RequirementType {
        &self.requirement_type
    }

    /// Default priority.
    pub fn default_priority(&self) -> i32 {
        self.priority
    }

    /// Parses a raw requirement against this validator's schema.
    pub fn parse_requirements(&self, raw: &Value, ctx: &dyn RequirementContext) -> ConfigResult<Requirements> {
        let requirements = self.requirement_type.parse(&self.name, raw, ctx)?;
        if let Some(guard) = &self.guard {
            guard(&requirements)?;
        }
        Ok(requirements)
    }

    /// Fails when no check handles values of this shape.
    pub fn ensure_supports(&self, value: &FieldValue) -> ConfigResult<()> {
        match value {
            FieldValue::Multiple(_) if self.multiple.is_none() => Err(ConfigError::MultipleUnsupported(self.name.clone())),
            FieldValue::Single(_) if self.string.is_none() && self.number.is_none() => {
                Err(ConfigError::SingleUnsupported(self.name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Dispatches `value` to the check for its shape.
    pub fn check(&self, value: &FieldValue, requirements: &Requirements, ctx: &CheckContext<'_>) -> ConfigResult<Check> {
        self.ensure_supports(value)?;
        let check = match value {
            FieldValue::Multiple(values) => self.multiple.as_ref().map(|f| f(values.as_slice(), requirements, ctx)),
            FieldValue::Single(value) => match (&self.number, &self.string) {
                // Numeric validators accept empty values.
                (Some(_), _) if value.is_empty() => Some(Check::Ready(true)),
                (Some(number), string) => match parse_number(value) {
                    Some(n) => Some(number(n, requirements, ctx)),
                    None => Some(string.as_ref().map_or(Check::Ready(false), |f| f(value.as_str(), requirements, ctx))),
                },
                (None, string) => string.as_ref().map(|f| f(value.as_str(), requirements, ctx)),
            },
        };
        Ok(check.unwrap_or(Check::Ready(false)))
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("name", &self.name)
            .field("requirement_type", &self.requirement_type)
            .field("priority", &self.priority)
            .field("string", &self.string.is_some())
            .field("multiple", &self.multiple.is_some())
            .field("number", &self.number.is_some())
            .finish_non_exhaustive()
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Validators and messages shared by every field bound through one engine.
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<String, Arc<Validator>>>,
    catalog: RwLock<Catalog>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorRegistry {
    /// An empty registry with an English catalog.
    pub fn new() -> Self {
        Self {
            validators: RwLock::new(HashMap::new()),
            catalog: RwLock::new(Catalog::new()),
        }
    }

    /// A registry preloaded with the built-in validators.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        register_builtins(&registry);
        registry
    }

    /// Registers a validator. A duplicate name warns and replaces; a reserved
    /// option name warns and is ignored.
    pub fn add_validator(&self, validator: Validator) {
        let name = validator.name().to_owned();
        if RESERVED_KEYS.contains(&name.as_str()) {
            warn!(validator = %name, "`{name}` is a restricted keyword and is not a valid validator name");
            return;
        }
        if self.has_validator(&name) {
            warn!(validator = %name, "validator `{name}` is already defined");
        }
        self.insert(validator);
    }

    /// Replaces a validator, adding it when absent.
    pub fn update_validator(&self, validator: Validator) {
        if self.has_validator(validator.name()) {
            self.insert(validator);
        } else {
            self.add_validator(validator);
        }
    }

    /// Removes a validator. Missing names warn.
    pub fn remove_validator(&self, name: &str) -> Option<Arc<Validator>> {
        let removed = self.validators.write().remove(name);
        if removed.is_none() {
            warn!(validator = %name, "validator `{name}` is not defined");
        } else {
            debug!(validator = %name, "validator removed");
        }
        removed
    }

    /// `true` when `name` is registered.
    pub fn has_validator(&self, name: &str) -> bool {
        self.validators.read().contains_key(name)
    }

    /// Looks a validator up.
    pub fn get(&self, name: &str) -> Option<Arc<Validator>> {
        self.validators.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.validators.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn insert(&self, validator: Validator) {
        if !validator.messages.is_empty() {
            let mut catalog = self.catalog.write();
            for (locale, message) in &validator.messages {
                catalog.add_message(locale, &validator.name, message);
            }
        }
        debug!(validator = %validator.name, priority = validator.priority, "validator registered");
        self.validators
            .write()
            .insert(validator.name.clone(), Arc::new(validator));
    }

    fn require(&self, name: &str) -> ConfigResult<Arc<Validator>> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownValidator(name.to_owned()))
    }

    /// Runs validator `name` against `value`.
    pub fn validate(
        &self,
        name: &str,
        value: &FieldValue,
        requirements: &Requirements,
        ctx: &CheckContext<'_>,
    ) -> ConfigResult<Check> {
        let check = self.require(name)?.check(value, requirements, ctx)?;
        trace!(validator = %name, ready = ?check.ready(), "validator checked");
        Ok(check)
    }

    /// Parses `raw` against validator `name`'s schema.
    pub fn parse_requirements(
        &self,
        name: &str,
        raw: &Value,
        ctx: &dyn RequirementContext,
    ) -> ConfigResult<Requirements> {
        self.require(name)?.parse_requirements(raw, ctx)
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Active locale.
    pub fn locale(&self) -> String {
        self.catalog.read().locale().to_owned()
    }

    /// Switches the active locale; fails when no catalog exists for it.
    pub fn set_locale(&self, locale: &str) -> ConfigResult<()> {
        self.catalog.write().set_locale(locale)
    }

    /// Adds a catalog, optionally making it active.
    pub fn add_catalog<K, V>(&self, locale: &str, messages: impl IntoIterator<Item = (K, V)>, activate: bool) -> ConfigResult<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut catalog = self.catalog.write();
        catalog.add_messages(locale, messages);
        if activate {
            catalog.set_locale(locale)?;
        }
        Ok(())
    }

    /// Adds or replaces one message.
    pub fn add_message(&self, locale: &str, name: &str, message: &str) {
        self.catalog.write().add_message(locale, name, message);
    }

    /// Adds or replaces several messages.
    pub fn add_messages<K, V>(&self, locale: &str, messages: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.catalog.write().add_messages(locale, messages);
    }

    /// Catalog message for a failed constraint; never fails.
    pub fn error_message(&self, constraint: &Constraint) -> String {
        self.catalog
            .read()
            .error_message(constraint.name(), constraint.requirements())
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.names())
            .field("locale", &self.locale())
            .finish()
    }
}
