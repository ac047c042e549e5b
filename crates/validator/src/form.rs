//! Forms: every field of a container, validated together.
//!
//! Fields are re-discovered on each pass from the `inputs` selector minus the
//! `excluded` one. Fields that disappeared since the last pass receive
//! `Reset` and are dropped. Every field's validation is awaited, even after
//! one has failed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tracing::{Instrument, debug, debug_span, trace};

use crate::engine::Engine;
use crate::error::ConfigResult;
use crate::event::{Event, EventBus, EventKind, Origin, Propagation, emit_chain};
use crate::field::{Field, FieldKey, FieldScope, ValidateOptions};
use crate::markup::{Container, Control, Selector};
use crate::options::{FocusPolicy, OptionLayer, Options};
use crate::outcome::{Outcome, Validity};
use crate::remote::RemoteValidators;

// ============================================================================
// OPTIONS
// ============================================================================

/// Per-call options of a form validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValidateOptions {
    /// Only validate fields of this group.
    pub group: Option<String>,
    /// Validate empty optional fields too.
    pub force: bool,
}

impl FormValidateOptions {
    /// Builder: restricts the run to `group`.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Builder: sets `force`.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

// ============================================================================
// SUBMIT
// ============================================================================

/// A submit event as seen by [`Form::intercept_submit`].
#[derive(Debug, Clone, Default)]
pub struct SubmitEvent {
    synthetic: bool,
    source: Option<Arc<dyn Control>>,
    default_prevented: bool,
}

impl SubmitEvent {
    /// A user-initiated submit, optionally naming the button that caused it.
    pub fn native(source: Option<Arc<dyn Control>>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// A resubmission issued after a deferred validation succeeded. Passes
    /// interception untouched.
    pub fn synthetic() -> Self {
        Self {
            synthetic: true,
            ..Self::default()
        }
    }

    /// `true` for resubmissions.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// The submitting control, if known.
    pub fn source(&self) -> Option<&Arc<dyn Control>> {
        self.source.as_ref()
    }

    /// Cancels the default action.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// `true` once the default action was cancelled.
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// A resubmission to perform once deferred validation succeeded.
#[derive(Debug, Clone)]
pub struct SyntheticSubmit {
    /// The event to dispatch; it bypasses interception.
    pub event: SubmitEvent,
    /// `name`/`value` of the button that triggered the original submit, to
    /// be replayed as a hidden input.
    pub button: Option<(String, String)>,
}

/// What to do with an intercepted submit.
pub enum Interception<'a> {
    /// Let the submission through.
    Proceed,
    /// The submission was cancelled: invalid, or vetoed by a `Submit`
    /// listener.
    Prevented,
    /// Cancelled for now. Drive the future: `Some` means resubmit with the
    /// synthetic event, `None` means validation failed or was vetoed.
    Deferred(BoxFuture<'a, Option<SyntheticSubmit>>),
}

impl fmt::Debug for Interception<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed => f.write_str("Proceed"),
            Self::Prevented => f.write_str("Prevented"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

// ============================================================================
// FORM
// ============================================================================

/// A bound form.
pub struct Form {
    container: Arc<dyn Container>,
    engine: Engine,
    overrides: OptionLayer,
    options: Options,
    fields: Vec<Field>,
    validity: Validity,
    bus: Arc<EventBus>,
    submit_source: Option<Arc<dyn Control>>,
}

impl Form {
    pub(crate) fn bind(engine: Engine, container: Arc<dyn Container>, overrides: OptionLayer) -> ConfigResult<Self> {
        let mut form = Self {
            container,
            engine,
            overrides,
            options: Options::default(),
            fields: Vec::new(),
            validity: Validity::Valid,
            bus: Arc::new(EventBus::new()),
            submit_source: None,
        };
        form.refresh_fields()?;
        debug!(fields = form.fields.len(), "form bound");
        form.emit(EventKind::Init);
        Ok(form)
    }

    /// The form's own event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Resolved form options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Result of the last [`when_validate`](Self::when_validate).
    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    /// Fields found by the last discovery pass, in document order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks a field up by key.
    pub fn field(&self, key: &FieldKey) -> Option<&Field> {
        self.fields.iter().find(|f| f.key() == key)
    }

    /// Mutable field lookup.
    pub fn field_mut(&mut self, key: &FieldKey) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.key() == key)
    }

    /// Binds `control` inside this form. Binding an already bound control
    /// merges `overrides` into the existing field.
    pub fn bind_field(&mut self, control: Arc<dyn Control>, overrides: OptionLayer) -> ConfigResult<&mut Field> {
        let scope = self.field_scope();
        let key = scope.key_for(&overrides, control.as_ref())?;
        let index = match self.fields.iter().position(|f| f.key() == &key) {
            Some(index) => {
                let field = &mut self.fields[index];
                field.merge_options(&overrides);
                field.adopt(control);
                field.refresh()?;
                index
            }
            None => {
                self.fields.push(Field::bind(control, overrides, scope)?);
                self.fields.len() - 1
            }
        };
        Ok(&mut self.fields[index])
    }

    /// Remembers the button that is about to submit the form.
    pub fn set_submit_source(&mut self, control: Arc<dyn Control>) {
        self.submit_source = Some(control);
    }

    fn field_scope(&self) -> FieldScope {
        let inner = self.engine.inner();
        FieldScope {
            registry: Arc::clone(&inner.registry),
            inherited: self.layers(),
            parents: vec![Arc::clone(&self.bus), Arc::clone(&inner.bus)],
            container: Some(Arc::clone(&self.container)),
        }
    }

    fn layers(&self) -> Vec<Arc<OptionLayer>> {
        let defaults = Arc::clone(&self.engine.inner().defaults);
        let namespace = defaults
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let attributes = OptionLayer::from_attributes(&namespace, self.container.attributes());
        vec![Arc::new(self.overrides.clone()), Arc::new(attributes), defaults]
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Re-reads form options and re-discovers fields. Known fields are kept
    /// (and refreshed); fields whose controls vanished receive `Reset`.
    pub fn refresh_fields(&mut self) -> ConfigResult<()> {
        let layers = self.layers();
        self.options = Options::new(layers);
        let scope = self.field_scope();
        let inputs = Selector::parse(&self.options.string("inputs").unwrap_or_default())?;
        let excluded = Selector::parse(&self.options.string("excluded").unwrap_or_default())?;

        let mut previous = std::mem::take(&mut self.fields);
        let mut fields = Vec::new();
        let discovered = discover(&*self.container, &scope, &inputs, &excluded, &mut previous, &mut fields);
        if let Err(error) = discovered {
            fields.append(&mut previous);
            self.fields = fields;
            return Err(error);
        }

        for mut removed in previous {
            trace!(field = %removed.key(), "field no longer present");
            removed.reset();
        }
        self.fields = fields;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Validates every field concurrently, emitting form events.
    ///
    /// Emits `Validate` first (a listener may [`invalidate`](Event::invalidate)
    /// the run), then re-discovers fields, then awaits every field. On
    /// failure the invalid field chosen by the `focus` option is focused
    /// before `Error` is emitted. `Validated` always comes last.
    ///
    /// Configuration errors are found before any field event is emitted; the
    /// form's `Validate` is then closed by `Validated` alone.
    pub fn when_validate(&mut self, options: FormValidateOptions) -> ConfigResult<impl Future<Output = Outcome> + '_> {
        self.validity = Validity::Valid;
        let mut event = Event::new(EventKind::Validate, Origin::Form);
        self.dispatch(&mut event);
        let invalidated = event.is_invalidated();

        let field_options = ValidateOptions {
            force: options.force,
            value: None,
            group: options.group.clone(),
        };
        let prepared = self.refresh_fields().and_then(|()| {
            self.fields
                .iter_mut()
                .try_for_each(|field| field.preflight(&field_options).map(drop))
        });
        if let Err(error) = prepared {
            debug!(%error, "form validation aborted");
            self.emit(EventKind::Validated);
            return Err(error);
        }

        let policy = FocusPolicy::from_value(self.options.resolve("focus"));
        let span = debug_span!("form.validate", fields = self.fields.len(), group = ?options.group);
        let chain = self.chain();
        let Self { fields, validity, .. } = self;

        let mut runs = Vec::with_capacity(fields.len());
        for field in fields.iter_mut() {
            let target = field.focus_target();
            if let Some(run) = field.when_validate(field_options.clone())? {
                runs.push(run.map(move |outcome| (outcome, target)));
            }
        }

        Ok(async move {
            *validity = Validity::Pending;
            let mut failures = Vec::new();
            let mut targets = Vec::new();
            for (outcome, target) in join_all(runs).await {
                if let Err(failed) = outcome {
                    failures.extend(failed);
                    targets.push(target);
                }
            }
            let outcome = if invalidated || !targets.is_empty() {
                Err(failures)
            } else {
                Ok(())
            };
            *validity = Validity::from(outcome.clone());

            if outcome.is_ok() {
                emit_chain(chain.iter().map(AsRef::as_ref), &mut Event::new(EventKind::Success, Origin::Form));
            } else {
                if let Some(target) = pick(policy, targets.into_iter().flatten()) {
                    target.focus();
                }
                emit_chain(chain.iter().map(AsRef::as_ref), &mut Event::new(EventKind::Error, Origin::Form));
            }
            emit_chain(chain.iter().map(AsRef::as_ref), &mut Event::new(EventKind::Validated, Origin::Form));
            debug!(valid = outcome.is_ok(), "form validated");
            outcome
        }
        .instrument(span))
    }

    /// Validates every field without emitting events.
    pub fn when_valid(&mut self, options: FormValidateOptions) -> ConfigResult<impl Future<Output = Outcome> + '_> {
        self.refresh_fields()?;
        let field_options = ValidateOptions {
            force: options.force,
            value: None,
            group: options.group,
        };
        let mut runs = Vec::with_capacity(self.fields.len());
        for field in &mut self.fields {
            if let Some(run) = field.when_valid(field_options.clone())? {
                runs.push(run);
            }
        }
        Ok(async move {
            let failures: Vec<_> = join_all(runs)
                .await
                .into_iter()
                .filter_map(Result::err)
                .collect();
            if failures.is_empty() {
                Ok(())
            } else {
                Err(failures.into_iter().flatten().collect())
            }
        })
    }

    /// Polls [`when_validate`](Self::when_validate) once.
    pub fn validate(&mut self, options: FormValidateOptions) -> ConfigResult<Validity> {
        Ok(Validity::from(self.when_validate(options)?.now_or_never()))
    }

    /// Polls [`when_valid`](Self::when_valid) once.
    pub fn is_valid(&mut self, options: FormValidateOptions) -> ConfigResult<Validity> {
        Ok(Validity::from(self.when_valid(options)?.now_or_never()))
    }

    /// Focuses the invalid field selected by the `focus` option and returns
    /// its control. Fields with `noFocus` are skipped.
    pub fn focus(&self) -> Option<Arc<dyn Control>> {
        let policy = FocusPolicy::from_value(self.options.resolve("focus"));
        let invalid = self
            .fields
            .iter()
            .filter(|f| f.validity().is_invalid() && f.has_constraints())
            .filter_map(Field::focus_target);
        let target = pick(policy, invalid)?;
        target.focus();
        Some(target)
    }

    // ------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------

    /// Runs validation for a native submit.
    ///
    /// Synthetic events and submits from a `formnovalidate` control pass.
    /// Otherwise the remote cache is cleared and the form validated: a
    /// settled success that no `Submit` listener cancels proceeds, anything
    /// else prevents the default action. A pending validation yields
    /// [`Interception::Deferred`].
    pub fn intercept_submit(&mut self, event: &mut SubmitEvent) -> ConfigResult<Interception<'_>> {
        if event.is_synthetic() {
            return Ok(Interception::Proceed);
        }
        let source = self
            .submit_source
            .take()
            .or_else(|| event.source().cloned())
            .or_else(|| self.default_submit_source());
        if source
            .as_ref()
            .is_some_and(|s| s.attribute("formnovalidate").is_some())
        {
            return Ok(Interception::Proceed);
        }

        self.remote().clear_cache();
        let button = source
            .as_ref()
            .and_then(|s| Some((s.attribute("name")?, s.attribute("value").unwrap_or_default())));
        let chain = self.chain();
        let mut run = Box::pin(self.when_validate(FormValidateOptions::default())?);

        match run.as_mut().now_or_never() {
            Some(Ok(())) => {
                drop(run);
                if emit_submit(&chain) == Propagation::Cancel {
                    event.prevent_default();
                    Ok(Interception::Prevented)
                } else {
                    Ok(Interception::Proceed)
                }
            }
            Some(Err(_)) => {
                event.prevent_default();
                Ok(Interception::Prevented)
            }
            None => {
                event.prevent_default();
                trace!("submit deferred until validation settles");
                Ok(Interception::Deferred(
                    async move {
                        run.await.ok()?;
                        (emit_submit(&chain) == Propagation::Continue).then(|| SyntheticSubmit {
                            event: SubmitEvent::synthetic(),
                            button,
                        })
                    }
                    .boxed(),
                ))
            }
        }
    }

    fn default_submit_source(&self) -> Option<Arc<dyn Control>> {
        self.container.controls().into_iter().find(|c| {
            let kind = c.input_type();
            match c.tag().as_str() {
                "input" => kind.as_deref() == Some("submit"),
                "button" => matches!(kind.as_deref(), None | Some("submit")),
                _ => false,
            }
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Resets every field, then emits `Reset`.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.reset();
        }
        self.validity = Validity::Valid;
        self.emit(EventKind::Reset);
    }

    /// Destroys every field, emits `Destroy` and drops the form's listeners.
    pub fn destroy(self) {
        let chain = self.chain();
        for field in self.fields {
            field.destroy();
        }
        emit_chain(chain.iter().map(AsRef::as_ref), &mut Event::new(EventKind::Destroy, Origin::Form));
        self.bus.clear();
        debug!("form destroyed");
    }

    fn remote(&self) -> &Arc<RemoteValidators> {
        &self.engine.inner().remote
    }

    fn chain(&self) -> [Arc<EventBus>; 2] {
        [Arc::clone(&self.bus), Arc::clone(&self.engine.inner().bus)]
    }

    fn emit(&self, kind: EventKind) -> Propagation {
        self.dispatch(&mut Event::new(kind, Origin::Form))
    }

    fn dispatch(&self, event: &mut Event<'_>) -> Propagation {
        emit_chain(self.chain().iter().map(AsRef::as_ref), event)
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("fields", &self.fields)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

fn discover(
    container: &dyn Container,
    scope: &FieldScope,
    inputs: &Selector,
    excluded: &Selector,
    previous: &mut Vec<Field>,
    fields: &mut Vec<Field>,
) -> ConfigResult<()> {
    let none = OptionLayer::new();
    for control in container.controls() {
        if !inputs.matches(control.as_ref()) || excluded.matches(control.as_ref()) {
            continue;
        }
        let options = scope.options_for(&none, control.as_ref());
        if options.resolve("excluded") == Some(&Value::Bool(true)) {
            continue;
        }

        let key = scope.key_for(&none, control.as_ref())?;
        if let Some(field) = fields.iter_mut().find(|f| f.key() == &key) {
            field.adopt(control);
            continue;
        }
        let field = match previous.iter().position(|f| f.key() == &key) {
            Some(index) => {
                let mut field = previous.remove(index);
                field.rescope(scope.clone());
                field.adopt(control);
                field
            }
            None => Field::bind(control, OptionLayer::new(), scope.clone())?,
        };
        fields.push(field);
    }
    for field in fields.iter_mut() {
        field.refresh()?;
    }
    Ok(())
}

fn pick(policy: FocusPolicy, mut candidates: impl Iterator<Item = Arc<dyn Control>>) -> Option<Arc<dyn Control>> {
    match policy {
        FocusPolicy::First => candidates.next(),
        FocusPolicy::Last => candidates.last(),
        FocusPolicy::Disabled => None,
    }
}

fn emit_submit(chain: &[Arc<EventBus>; 2]) -> Propagation {
    emit_chain(chain.iter().map(AsRef::as_ref), &mut Event::new(EventKind::Submit, Origin::Form))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{Document, Element};
    use pretty_assertions::assert_eq;

    fn form(doc: &Arc<Document>) -> Form {
        Engine::new().bind_form(doc.clone(), OptionLayer::new()).unwrap()
    }

    #[test]
    fn discovery_skips_excluded_controls_and_groups_radios() {
        let doc = Arc::new(Document::new());
        doc.append(Element::input("text").with_attr("name", "a"));
        doc.append(Element::input("submit"));
        doc.append(Element::input("hidden"));
        doc.append(Element::input("text").with_attr("data-parsley-excluded", "true"));
        doc.append(Element::input("radio").with_attr("name", "r"));
        doc.append(Element::input("radio").with_attr("name", "r"));

        let form = form(&doc);
        assert_eq!(form.fields().len(), 2);
        let group = form.field(&FieldKey::Group("r".into())).unwrap();
        assert_eq!(group.controls().len(), 2);
    }

    #[test]
    fn form_attributes_are_inherited() {
        let doc = Arc::new(Document::new().with_attr("data-parsley-required", "true"));
        doc.append(Element::input("text"));
        let mut form = form(&doc);
        assert!(form.fields()[0].is_required());
        assert!(form.validate(FormValidateOptions::default()).unwrap().is_invalid());
    }

    #[test]
    fn rebinding_merges_overrides() {
        let doc = Arc::new(Document::new());
        let input = doc.append(Element::input("text"));
        let mut form = form(&doc);
        form.bind_field(input.handle(), OptionLayer::new().with("minlength", 2))
            .unwrap();
        assert_eq!(form.fields().len(), 1);
        assert!(form.fields()[0].constraint("minlength").is_some());
    }

    #[test]
    fn removed_fields_are_reset() {
        let doc = Arc::new(Document::new());
        let gone = doc.append(Element::input("text").with_attr("required", ""));
        doc.append(Element::input("text"));
        let mut form = form(&doc);

        let resets = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = Arc::clone(&resets);
        form.bus().subscribe(EventKind::Reset, move |event| {
            seen.lock().push(event.origin().clone());
            Propagation::Continue
        });

        doc.remove(gone.id());
        form.refresh_fields().unwrap();
        assert_eq!(form.fields().len(), 1);
        assert_eq!(*resets.lock(), vec![Origin::Field(FieldKey::Control(gone.id()))]);
    }

    #[test]
    fn focus_policy_picks_the_invalid_field() {
        let doc = Arc::new(Document::new().with_attr("data-parsley-focus", "last"));
        let first = doc.append(Element::input("text").with_attr("required", ""));
        let second = doc.append(Element::input("text").with_attr("required", ""));
        let mut form = form(&doc);
        assert!(form.validate(FormValidateOptions::default()).unwrap().is_invalid());
        assert!(!first.is_focused());
        assert!(second.is_focused());
    }

    #[test]
    fn listeners_may_invalidate_the_form() {
        let doc = Arc::new(Document::new());
        doc.append(Element::input("text"));
        let mut form = form(&doc);
        form.bus().subscribe(EventKind::Validate, |event| {
            event.invalidate();
            Propagation::Continue
        });
        assert_eq!(
            form.validate(FormValidateOptions::default()).unwrap(),
            Validity::Invalid(Vec::new())
        );
    }

    #[test]
    fn groups_restrict_the_run() {
        let doc = Arc::new(Document::new());
        doc.append(
            Element::input("text")
                .with_attr("required", "")
                .with_attr("data-parsley-group", "one"),
        );
        doc.append(
            Element::input("text")
                .with_attr("required", "")
                .with_attr("data-parsley-group", "two"),
        );
        let mut form = form(&doc);
        let validity = form.validate(FormValidateOptions::default().group("two")).unwrap();
        assert_eq!(validity.failures().len(), 1);
    }
}
