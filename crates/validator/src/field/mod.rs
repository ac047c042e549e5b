//! Fields: one validatable value with its constraints.
//!
//! A [`Field`] wraps a single control, a radio/checkbox group or a
//! multi-select. Its options resolve through
//! `overrides → attributes → form layers → defaults`, and its constraints
//! are rebuilt from those options on every [`refresh`](Field::refresh):
//! programmatic constraints survive, markup-derived ones are re-read.
//!
//! Validation runs constraints in priority groups, highest first. A group
//! settles completely (deferred checks included) before the next one
//! starts, and the first group that rejects ends the run.
//!
//! ```rust,ignore
//! let email = Element::input("email").with_attr("required", "");
//! let mut field = engine.bind_field(email.handle(), OptionLayer::new())?;
//! assert!(field.validate(ValidateOptions::default())?.is_invalid());
//! ```

mod multi;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};

use futures::FutureExt;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::constraint::Constraint;
use crate::error::{ConfigError, ConfigResult};
use crate::event::{Event, EventBus, EventKind, Origin, Propagation, emit_chain};
use crate::markup::{Container, Control, ControlId, ControlKind};
use crate::options::{OptionLayer, Options};
use crate::outcome::{Check, Failure, Outcome, Rejection, Validity};
use crate::registry::{CheckContext, ValidatorRegistry, format_message};
use crate::requirement::RequirementContext;
use crate::value::{FieldValue, Whitespace};

pub(crate) use multi::group_identity;

// ============================================================================
// IDENTITY
// ============================================================================

/// Identity of a field within its form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// A field bound to one control.
    Control(ControlId),
    /// A radio or checkbox group.
    Group(String),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(id) => id.fmt(f),
            Self::Group(identity) => write!(f, "group:{identity}"),
        }
    }
}

/// What a field inherits from the scope it was bound in.
#[derive(Clone)]
pub(crate) struct FieldScope {
    pub(crate) registry: Arc<ValidatorRegistry>,
    /// Form layers then defaults, most specific first.
    pub(crate) inherited: Vec<Arc<OptionLayer>>,
    /// Form bus then root bus.
    pub(crate) parents: Vec<Arc<EventBus>>,
    pub(crate) container: Option<Arc<dyn Container>>,
}

impl FieldScope {
    fn namespace(&self) -> String {
        Options::new(self.inherited.iter().cloned())
            .string("namespace")
            .unwrap_or_default()
    }

    /// Option chain for `control` with `overrides` on top.
    pub(crate) fn options_for(&self, overrides: &OptionLayer, control: &dyn Control) -> Options {
        let attributes = OptionLayer::from_attributes(&self.namespace(), control.attributes());
        Options::new(
            [Arc::new(overrides.clone()), Arc::new(attributes)]
                .into_iter()
                .chain(self.inherited.iter().cloned()),
        )
    }

    /// The key `control` would be bound under.
    pub(crate) fn key_for(&self, overrides: &OptionLayer, control: &dyn Control) -> ConfigResult<FieldKey> {
        if control.kind().is_grouped() {
            let options = self.options_for(overrides, control);
            Ok(FieldKey::Group(group_identity(control, &options)?))
        } else {
            Ok(FieldKey::Control(control.id()))
        }
    }
}

enum Shape {
    Single(Arc<dyn Control>),
    Group {
        kind: ControlKind,
        members: Vec<Arc<dyn Control>>,
    },
    MultiSelect(Arc<dyn Control>),
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Per-call validation options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidateOptions {
    /// Validate even when the value is empty and not required.
    pub force: bool,
    /// Validate this value instead of the control's.
    pub value: Option<FieldValue>,
    /// Only validate if the field belongs to this group.
    pub group: Option<String>,
}

impl ValidateOptions {
    /// Builder: sets `force`.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Builder: validates `value` instead of the control's value.
    #[must_use]
    pub fn value(mut self, value: impl Into<FieldValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder: restricts the run to `group`.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

struct Plan {
    groups: Vec<Vec<Constraint>>,
    value: FieldValue,
    key: Option<String>,
}

// ============================================================================
// FIELD
// ============================================================================

/// A bound field.
pub struct Field {
    key: FieldKey,
    shape: Shape,
    scope: FieldScope,
    overrides: OptionLayer,
    options: Options,
    constraints: Vec<Constraint>,
    validity: Validity,
    bus: Arc<EventBus>,
}

impl Field {
    /// Binds one control. Radio buttons and checkboxes start a group.
    pub(crate) fn bind(control: Arc<dyn Control>, overrides: OptionLayer, scope: FieldScope) -> ConfigResult<Self> {
        let options = scope.options_for(&overrides, control.as_ref());
        let (key, shape) = match control.kind() {
            kind @ (ControlKind::Radio | ControlKind::Checkbox) => {
                let identity = group_identity(control.as_ref(), &options)?;
                (
                    FieldKey::Group(identity),
                    Shape::Group {
                        kind,
                        members: vec![control],
                    },
                )
            }
            ControlKind::MultiSelect => {
                // Multi-selects are stamped too, but keyed by control.
                let identity = group_identity(control.as_ref(), &options)?;
                control.set_attribute(&format!("{}multiple", scope.namespace()), &identity);
                (FieldKey::Control(control.id()), Shape::MultiSelect(control))
            }
            ControlKind::Text => (FieldKey::Control(control.id()), Shape::Single(control)),
        };

        let mut field = Self {
            key,
            shape,
            scope,
            overrides,
            options,
            constraints: Vec::new(),
            validity: Validity::Valid,
            bus: Arc::new(EventBus::new()),
        };
        field.stamp_identity();
        field.refresh()?;
        debug!(field = %field.key, constraints = field.constraints.len(), "field bound");
        field.emit(EventKind::Init);
        Ok(field)
    }

    /// Binds several controls as one field. Every control must resolve to
    /// the same group identity.
    pub(crate) fn bind_group(
        controls: impl IntoIterator<Item = Arc<dyn Control>>,
        overrides: OptionLayer,
        scope: FieldScope,
    ) -> ConfigResult<Self> {
        let mut controls = controls.into_iter();
        let first = controls
            .next()
            .ok_or_else(|| ConfigError::MissingGroupIdentity("<empty group>".to_owned()))?;
        let mut field = Self::bind(first, overrides, scope)?;
        for control in controls {
            let key = field.scope.key_for(&field.overrides, control.as_ref())?;
            if key != field.key {
                return Err(ConfigError::MissingGroupIdentity(control.id().to_string()));
            }
            field.adopt(control);
        }
        field.refresh()?;
        Ok(field)
    }

    /// Adds a sibling to a radio/checkbox group. Returns `false` for
    /// non-group fields and for controls that are already members.
    pub(crate) fn adopt(&mut self, control: Arc<dyn Control>) -> bool {
        let Shape::Group { members, .. } = &mut self.shape else {
            return false;
        };
        if members.iter().any(|m| m.id() == control.id()) {
            return false;
        }
        trace!(field = %self.key, control = %control.id(), "group member adopted");
        members.push(control);
        self.stamp_identity();
        true
    }

    pub(crate) fn rescope(&mut self, scope: FieldScope) {
        self.scope = scope;
    }

    fn stamp_identity(&self) {
        if let FieldKey::Group(identity) = &self.key {
            let attribute = format!("{}multiple", self.scope.namespace());
            for control in self.controls() {
                control.set_attribute(&attribute, identity);
            }
        }
    }

    /// Identity within the form.
    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    /// The field's own event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Resolved options as of the last refresh.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Result of the last validation.
    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    /// Current constraints, in insertion order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Every control of the field.
    pub fn controls(&self) -> &[Arc<dyn Control>] {
        match &self.shape {
            Shape::Single(control) | Shape::MultiSelect(control) => std::slice::from_ref(control),
            Shape::Group { members, .. } => members,
        }
    }

    fn primary(&self) -> Option<&Arc<dyn Control>> {
        self.controls().iter().find(|c| c.is_attached())
    }

    /// Merges option overrides, as re-binding an already bound control does.
    pub fn merge_options(&mut self, overrides: &OptionLayer) {
        self.overrides.merge(overrides);
    }

    // ------------------------------------------------------------------
    // Value
    // ------------------------------------------------------------------

    /// The value to validate. The `value` option wins over the control.
    /// Single controls then get the `whitespace` policy applied.
    pub fn value(&self) -> FieldValue {
        if let Some(value) = self.options.resolve("value") {
            return match value {
                Value::Array(items) => FieldValue::Multiple(items.iter().map(render).collect()),
                other => FieldValue::Single(render(other)),
            };
        }
        match &self.shape {
            Shape::Group { kind, members } => multi::group_value(*kind, members),
            Shape::MultiSelect(control) => match control.value() {
                FieldValue::Single(s) if s.is_empty() => FieldValue::Multiple(Vec::new()),
                value => value,
            },
            Shape::Single(control) => control.value().apply_whitespace(self.whitespace()),
        }
    }

    fn whitespace(&self) -> Whitespace {
        if self.options.flag("trimValue") == Some(true) {
            warn_once("the `trimValue` option is deprecated, use `whitespace: trim` instead");
            return Whitespace::Trim;
        }
        self.options
            .string("whitespace")
            .map_or(Whitespace::Keep, |w| Whitespace::from_option(&w))
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// `true` when at least one constraint is bound.
    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// The constraint called `name`.
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name() == name)
    }

    /// `true` when a `required` constraint demands a value.
    pub fn is_required(&self) -> bool {
        self.constraint("required").is_some_and(|c| {
            c.requirements()
                .first()
                .and_then(|r| r.as_bool())
                .unwrap_or(true)
        })
    }

    /// `false` only for an empty value of a field that is neither required
    /// nor marked `validateIfEmpty`.
    pub fn needs_validation(&self, value: &FieldValue) -> bool {
        !value.is_empty() || self.is_required() || self.options.flag("validateIfEmpty") == Some(true)
    }

    /// Adds a programmatic constraint, replacing any constraint of the same
    /// name. Unknown validators are ignored.
    pub fn add_constraint(&mut self, name: &str, requirements: impl Into<Value>, priority: Option<i32>) -> ConfigResult<()> {
        self.bind_constraint(name, &requirements.into(), priority, false)
    }

    /// Removes the constraint called `name`.
    pub fn remove_constraint(&mut self, name: &str) -> bool {
        let before = self.constraints.len();
        self.constraints.retain(|c| c.name() != name);
        before != self.constraints.len()
    }

    /// Removes then re-adds `name`.
    pub fn update_constraint(&mut self, name: &str, requirements: impl Into<Value>, priority: Option<i32>) -> ConfigResult<()> {
        self.remove_constraint(name);
        self.add_constraint(name, requirements, priority)
    }

    fn bind_constraint(&mut self, name: &str, raw: &Value, priority: Option<i32>, is_dom: bool) -> ConfigResult<()> {
        let ctx = Lookup {
            options: &self.options,
            container: self.scope.container.as_deref(),
        };
        match Constraint::bind(&self.scope.registry, name, raw, priority, is_dom, &ctx)? {
            Some(constraint) => upsert(&mut self.constraints, constraint),
            None => trace!(field = %self.key, validator = %name, "no such validator, constraint ignored"),
        }
        Ok(())
    }

    /// Re-reads options from the controls and rebuilds constraints.
    /// Programmatic constraints are kept; markup-derived ones are replaced.
    pub fn refresh(&mut self) -> ConfigResult<()> {
        if let Shape::Group { members, .. } = &mut self.shape {
            members.retain(|m| m.is_attached());
        }
        if let Some(primary) = self.primary().cloned() {
            self.options = self.scope.options_for(&self.overrides, primary.as_ref());
        }

        let mut constraints: Vec<Constraint> = self
            .constraints
            .iter()
            .filter(|c| !c.is_dom_constraint())
            .cloned()
            .collect();
        for control in self.controls() {
            let options = self.scope.options_for(&self.overrides, control.as_ref());
            for constraint in self.derive(control.as_ref(), &options)? {
                upsert(&mut constraints, constraint);
            }
        }
        self.constraints = constraints;
        trace!(field = %self.key, constraints = self.constraints.len(), "constraints refreshed");
        Ok(())
    }

    fn derive(&self, control: &dyn Control, options: &Options) -> ConfigResult<Vec<Constraint>> {
        let registry = &self.scope.registry;
        let ctx = Lookup {
            options,
            container: self.scope.container.as_deref(),
        };
        let mut derived = Vec::new();
        for name in options.keys() {
            if let Some(raw) = options.resolve(name)
                && let Some(constraint) = Constraint::bind(registry, name, raw, None, true, &ctx)?
            {
                upsert(&mut derived, constraint);
            }
        }
        for (name, raw) in implicit_constraints(control) {
            if let Some(constraint) = Constraint::bind(registry, name, &raw, None, true, &ctx)? {
                upsert(&mut derived, constraint);
            }
        }
        Ok(derived)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// `true` when the `group` option names `group` (a string or a list).
    pub fn is_in_group(&self, group: &str) -> bool {
        match self.options.resolve("group") {
            Some(Value::Array(groups)) => groups.iter().any(|g| render(g) == group),
            Some(Value::Null) | None => false,
            Some(other) => render(other) == group,
        }
    }

    /// Validates without emitting events.
    ///
    /// Returns `Ok(None)` when `options.group` excludes the field: that is
    /// "not decided", not "valid". Configuration problems surface as `Err`
    /// before anything runs.
    pub fn when_valid(&mut self, options: ValidateOptions) -> ConfigResult<Option<impl Future<Output = Outcome> + '_>> {
        self.refresh()?;
        if let Some(group) = &options.group
            && !self.is_in_group(group)
        {
            return Ok(None);
        }
        let value = options.value.unwrap_or_else(|| self.value());
        let plan = self.plan(options.force, value)?;
        Ok(Some(self.settle(plan)))
    }

    /// Like [`when_valid`](Self::when_valid) but snapshots the value, emits
    /// `Validate` (listeners may rewrite the snapshot), then `Success` or
    /// `Error`, then `Validated`.
    pub fn when_validate(&mut self, options: ValidateOptions) -> ConfigResult<Option<impl Future<Output = Outcome> + '_>> {
        self.refresh()?;
        if let Some(group) = &options.group
            && !self.is_in_group(group)
        {
            return Ok(None);
        }
        let mut value = options.value.unwrap_or_else(|| self.value());
        let mut event = Event::new(EventKind::Validate, self.origin()).with_value(&mut value);
        self.dispatch(&mut event);
        let plan = match self.plan(options.force, value) {
            Ok(plan) => plan,
            Err(error) => {
                self.emit(EventKind::Validated);
                return Err(error);
            }
        };

        Ok(Some(async move {
            let outcome = self.settle(plan).await;
            self.emit(if outcome.is_ok() { EventKind::Success } else { EventKind::Error });
            self.emit(EventKind::Validated);
            outcome
        }))
    }

    /// Polls [`when_validate`](Self::when_validate) once. Deferred checks
    /// still in flight give [`Validity::Pending`].
    pub fn validate(&mut self, options: ValidateOptions) -> ConfigResult<Validity> {
        Ok(match self.when_validate(options)? {
            Some(run) => Validity::from(run.now_or_never()),
            None => Validity::Valid,
        })
    }

    /// Polls [`when_valid`](Self::when_valid) once.
    pub fn is_valid(&mut self, options: ValidateOptions) -> ConfigResult<Validity> {
        Ok(match self.when_valid(options)? {
            Some(run) => Validity::from(run.now_or_never()),
            None => Validity::Valid,
        })
    }

    /// Refreshes and checks that every constraint can handle the value a
    /// run would see, without emitting events. `Ok(false)` when
    /// `options.group` excludes the field.
    pub(crate) fn preflight(&mut self, options: &ValidateOptions) -> ConfigResult<bool> {
        self.refresh()?;
        if let Some(group) = &options.group
            && !self.is_in_group(group)
        {
            return Ok(false);
        }
        let value = options.value.clone().unwrap_or_else(|| self.value());
        self.ensure_supported(options.force, &value)?;
        Ok(true)
    }

    /// `Ok(false)` when nothing needs checking.
    fn ensure_supported(&self, force: bool, value: &FieldValue) -> ConfigResult<bool> {
        if self.constraints.is_empty() || (!force && !self.needs_validation(value)) {
            return Ok(false);
        }
        for constraint in &self.constraints {
            constraint.validator().ensure_supports(value)?;
        }
        Ok(true)
    }

    fn plan(&mut self, force: bool, value: FieldValue) -> ConfigResult<Option<Plan>> {
        self.validity = Validity::Valid;
        if !self.ensure_supported(force, &value)? {
            return Ok(None);
        }
        let grouped = self.options.flag("priorityEnabled").unwrap_or(true);
        Ok(Some(Plan {
            groups: priority_groups(&self.constraints, grouped),
            value,
            key: self.primary().and_then(|c| c.key()),
        }))
    }

    async fn settle(&mut self, plan: Option<Plan>) -> Outcome {
        let Some(plan) = plan else {
            return Ok(());
        };
        self.validity = Validity::Pending;
        let outcome = evaluate(plan).await;
        self.validity = Validity::from(outcome.clone());
        outcome
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// One message per failure of the last validation.
    pub fn error_messages(&self) -> Vec<String> {
        self.validity
            .failures()
            .iter()
            .map(|failure| self.error_message(failure))
            .collect()
    }

    /// Message for one failure: the check's own message, else the
    /// `<name>Message` option, else `errorMessage`, else the catalog.
    pub fn error_message(&self, failure: &Failure) -> String {
        if let Some(message) = &failure.message {
            return message.clone();
        }
        let constraint = &failure.constraint;
        if let Some(template) = self.options.string(&format!("{}Message", constraint.name())) {
            return format_message(&template, constraint.requirements());
        }
        if let Some(message) = self.options.string("errorMessage") {
            return message;
        }
        self.scope.registry.error_message(constraint)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Control that should receive focus after a failed form validation.
    pub(crate) fn focus_target(&self) -> Option<Arc<dyn Control>> {
        if self.options.flag("noFocus") == Some(true) {
            return None;
        }
        self.primary().cloned()
    }

    /// Drops the last result and emits `Reset`.
    pub fn reset(&mut self) {
        self.validity = Validity::Valid;
        self.emit(EventKind::Reset);
    }

    /// Emits `Destroy` and releases the field's listeners.
    pub fn destroy(self) {
        self.emit(EventKind::Destroy);
        self.bus.clear();
        debug!(field = %self.key, "field destroyed");
    }

    fn origin(&self) -> Origin {
        Origin::Field(self.key.clone())
    }

    fn emit(&self, kind: EventKind) -> Propagation {
        self.dispatch(&mut Event::new(kind, self.origin()))
    }

    fn dispatch(&self, event: &mut Event<'_>) -> Propagation {
        let chain = std::iter::once(self.bus.as_ref()).chain(self.scope.parents.iter().map(AsRef::as_ref));
        emit_chain(chain, event)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("key", &self.key)
            .field("controls", &self.controls().len())
            .field("constraints", &self.constraints)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Partitions constraints by priority, highest first. With grouping off,
/// everything is one group.
fn priority_groups(constraints: &[Constraint], enabled: bool) -> Vec<Vec<Constraint>> {
    if !enabled {
        return vec![constraints.to_vec()];
    }
    let mut sorted = constraints.to_vec();
    sorted.sort_by_key(|c| std::cmp::Reverse(c.priority()));
    sorted
        .chunk_by(|a, b| a.priority() == b.priority())
        .map(<[Constraint]>::to_vec)
        .collect()
}

async fn evaluate(plan: Plan) -> Outcome {
    let Plan { groups, value, key } = plan;
    let ctx = CheckContext::new(key.as_deref());
    for group in groups {
        let priority = group.first().map(Constraint::priority);
        let checks = group.into_iter().map(|constraint| {
            let check = constraint.check(&value, &ctx);
            async move {
                let verdict = match check {
                    Ok(Check::Ready(true)) => Ok(()),
                    Ok(Check::Ready(false)) => Err(Rejection::new()),
                    Ok(Check::Deferred(pending)) => pending.await,
                    Err(error) => {
                        warn!(validator = %constraint.name(), %error, "constraint could not be checked");
                        Err(Rejection::new())
                    }
                };
                trace!(validator = %constraint.name(), ok = verdict.is_ok(), "constraint checked");
                verdict
                    .err()
                    .map(|rejection| Failure::new(constraint, rejection.message().map(str::to_owned)))
            }
        });
        let failures: Vec<Failure> = join_all(checks).await.into_iter().flatten().collect();
        if !failures.is_empty() {
            trace!(?priority, failures = failures.len(), "priority group rejected");
            return Err(failures);
        }
    }
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

struct Lookup<'a> {
    options: &'a Options,
    container: Option<&'a dyn Container>,
}

impl RequirementContext for Lookup<'_> {
    fn extra_option(&self, key: &str) -> Option<Value> {
        self.options.resolve(key).cloned()
    }

    fn lookup(&self, selector: &str) -> ConfigResult<Option<Arc<dyn Control>>> {
        self.container.map_or(Ok(None), |container| container.find(selector))
    }
}

fn upsert(constraints: &mut Vec<Constraint>, constraint: Constraint) {
    match constraints.iter_mut().find(|c| c.name() == constraint.name()) {
        Some(slot) => *slot = constraint,
        None => constraints.push(constraint),
    }
}

/// Constraints implied by standard form attributes.
fn implicit_constraints(control: &dyn Control) -> Vec<(&'static str, Value)> {
    let attr = |name: &str| control.attribute(name);
    let mut implied = Vec::new();

    if attr("required").is_some() {
        implied.push(("required", Value::Bool(true)));
    }
    if let Some(pattern) = attr("pattern") {
        implied.push(("pattern", Value::String(pattern)));
    }

    let (min, max) = (attr("min"), attr("max"));
    match (&min, &max) {
        (Some(min), Some(max)) => implied.push(("range", Value::String(format!("[{min}, {max}]")))),
        (Some(min), None) => implied.push(("min", Value::String(min.clone()))),
        (None, Some(max)) => implied.push(("max", Value::String(max.clone()))),
        (None, None) => {}
    }

    match (attr("minlength"), attr("maxlength")) {
        (Some(lo), Some(hi)) => implied.push(("length", Value::String(format!("[{lo}, {hi}]")))),
        (Some(lo), None) => implied.push(("minlength", Value::String(lo))),
        (None, Some(hi)) => implied.push(("maxlength", Value::String(hi))),
        (None, None) => {}
    }

    match control.input_type().as_deref() {
        Some("number") => {
            let mut extras = serde_json::Map::new();
            extras.insert("step".to_owned(), Value::String(attr("step").unwrap_or_else(|| "1".to_owned())));
            if let Some(base) = min.or_else(|| attr("value")) {
                extras.insert("base".to_owned(), Value::String(base));
            }
            implied.push(("type", Value::Array(vec![Value::from("number"), Value::Object(extras)])));
        }
        Some(kind @ ("email" | "url" | "range")) => implied.push(("type", Value::from(kind))),
        _ => {}
    }
    implied
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn warn_once(message: &'static str) {
    static WARNED: LazyLock<Mutex<HashSet<&'static str>>> = LazyLock::new(|| Mutex::new(HashSet::new()));
    if WARNED.lock().insert(message) {
        warn!("{message}");
    }
}
