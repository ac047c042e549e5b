//! A validator bound to a field with parsed requirements.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ConfigResult;
use crate::outcome::Check;
use crate::registry::{CheckContext, Validator, ValidatorRegistry};
use crate::requirement::{RequirementContext, Requirements};
use crate::value::FieldValue;

/// One constraint of a field.
///
/// The priority is the explicit one when given, else the field's
/// `<name>Priority` option, else the validator's default.
#[derive(Clone)]
pub struct Constraint {
    name: String,
    requirements: Requirements,
    priority: i32,
    is_dom: bool,
    validator: Arc<Validator>,
}

impl Constraint {
    /// Binds validator `name`. Returns `Ok(None)` when no such validator is
    /// registered.
    pub fn bind(
        registry: &ValidatorRegistry,
        name: &str,
        raw: &Value,
        priority: Option<i32>,
        is_dom: bool,
        ctx: &dyn RequirementContext,
    ) -> ConfigResult<Option<Self>> {
        let Some(validator) = registry.get(name) else {
            return Ok(None);
        };
        let requirements = validator.parse_requirements(raw, ctx)?;
        let priority = priority
            .or_else(|| {
                ctx.extra_option(&format!("{name}Priority"))
                    .and_then(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))
                    .and_then(|p| i32::try_from(p).ok())
            })
            .unwrap_or_else(|| validator.default_priority());
        Ok(Some(Self {
            name: name.to_owned(),
            requirements,
            priority,
            is_dom,
            validator,
        }))
    }

    /// Validator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed requirements.
    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Effective priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// `true` when derived from markup rather than added in code.
    pub fn is_dom_constraint(&self) -> bool {
        self.is_dom
    }

    /// The bound validator.
    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    /// Runs the validator against `value`.
    pub fn check(&self, value: &FieldValue, ctx: &CheckContext<'_>) -> ConfigResult<Check> {
        self.validator.check(value, &self.requirements, ctx)
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.requirements == other.requirements
            && self.priority == other.priority
            && self.is_dom == other.is_dom
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("requirements", &self.requirements)
            .field("priority", &self.priority)
            .field("is_dom", &self.is_dom)
            .finish()
    }
}
