//! Form discovery, aggregate validation and submit interception.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use formguard_validator::prelude::*;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

// ============================================================================
// TRANSPORTS
// ============================================================================

/// Answers every request with a fixed status.
#[derive(Default)]
struct Answering {
    calls: AtomicUsize,
}

impl RemoteTransport for Answering {
    fn send(&self, _request: Request) -> BoxFuture<'static, Result<Response, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(Response {
            status: 200,
            body: String::new(),
        }))
        .boxed()
    }
}

/// Holds every request until the test releases a status.
struct Gated {
    status: Shared<BoxFuture<'static, u16>>,
    calls: AtomicUsize,
}

impl Gated {
    fn new() -> (oneshot::Sender<u16>, Arc<Self>) {
        let (release, status) = oneshot::channel();
        let status = status.map(|status| status.unwrap_or(500)).boxed().shared();
        let gated = Arc::new(Self {
            status,
            calls: AtomicUsize::new(0),
        });
        (release, gated)
    }
}

impl RemoteTransport for Gated {
    fn send(&self, _request: Request) -> BoxFuture<'static, Result<Response, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.status
            .clone()
            .map(|status| {
                Ok(Response {
                    status,
                    body: String::new(),
                })
            })
            .boxed()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn engine() -> Engine {
    Engine::builder().transport(Arc::new(NoTransport)).build()
}

fn text(name: &str) -> Element {
    Element::input("text").with_attr("name", name)
}

fn count(bus: &EventBus, kind: EventKind) -> Arc<AtomicUsize> {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    bus.subscribe(kind, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Propagation::Continue
    });
    seen
}

// ============================================================================
// DISCOVERY AND AGGREGATION
// ============================================================================

#[test]
fn a_form_is_valid_only_when_every_field_is() {
    let doc = Arc::new(Document::new());
    let user = doc.append(text("user").with_attr("required", ""));
    doc.append(text("mail").with_attr("type", "email").with_value("bob@example.com"));
    doc.append(Element::input("submit"));
    let mut form = engine().bind_form(doc.clone(), OptionLayer::new()).unwrap();
    assert_eq!(form.fields().len(), 2);

    let validity = form.validate(FormValidateOptions::default()).unwrap();
    assert_eq!(validity.failures().len(), 1);
    assert_eq!(validity.failures()[0].constraint.name(), "required");
    assert!(form.validity().is_invalid());

    user.set_value("bob");
    assert!(form.validate(FormValidateOptions::default()).unwrap().is_valid());
    assert!(form.validity().is_valid());
}

#[test]
fn fields_appear_and_disappear_with_their_controls() {
    let doc = Arc::new(Document::new());
    doc.append(text("first"));
    let mut form = engine().bind_form(doc.clone(), OptionLayer::new()).unwrap();
    let resets = count(form.bus(), EventKind::Reset);

    let second = doc.append(text("second").with_attr("required", ""));
    assert!(form.validate(FormValidateOptions::default()).unwrap().is_invalid());
    assert_eq!(form.fields().len(), 2);

    doc.remove(second.id());
    assert!(form.validate(FormValidateOptions::default()).unwrap().is_valid());
    assert_eq!(form.fields().len(), 1);
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}

#[test]
fn excluded_controls_are_not_fields() {
    let doc = Arc::new(Document::new());
    doc.append(text("kept"));
    doc.append(Element::input("hidden").with_attr("name", "token"));
    doc.append(text("skipped").with_attr("data-parsley-excluded", "true"));
    let form = engine().bind_form(doc, OptionLayer::new()).unwrap();
    assert_eq!(form.fields().len(), 1);
}

#[test]
fn checkbox_groups_validate_as_one_field() {
    let doc = Arc::new(Document::new());
    let red = doc.append(
        Element::input("checkbox")
            .with_attr("name", "colors[]")
            .with_attr("value", "red")
            .with_attr("data-parsley-mincheck", "2"),
    );
    let blue = doc.append(
        Element::input("checkbox")
            .with_attr("name", "colors[]")
            .with_attr("value", "blue"),
    );
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();
    let key = FieldKey::Group("colors".into());
    assert_eq!(form.fields().len(), 1);
    assert!(form.field(&key).is_some());

    red.set_checked(true);
    assert!(form.validate(FormValidateOptions::default()).unwrap().is_invalid());
    assert_eq!(
        form.field(&key).map(Field::value),
        Some(FieldValue::Multiple(vec!["red".into()]))
    );

    blue.set_checked(true);
    assert!(form.validate(FormValidateOptions::default()).unwrap().is_valid());
}

#[test]
fn group_restricted_validation_ignores_other_fields() {
    let doc = Arc::new(Document::new());
    doc.append(text("a").with_attr("required", "").with_attr("data-parsley-group", "step-1"));
    doc.append(text("b").with_value("ok").with_attr("data-parsley-group", "step-2"));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();

    assert!(form
        .validate(FormValidateOptions::default().group("step-2"))
        .unwrap()
        .is_valid());
    assert!(form
        .validate(FormValidateOptions::default().group("step-1"))
        .unwrap()
        .is_invalid());
}

#[test]
fn form_level_options_reach_every_field() {
    let doc = Arc::new(Document::new().with_attr("data-parsley-minlength", "4"));
    doc.append(text("a").with_value("abc"));
    doc.append(text("b").with_value("abcd"));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();

    let validity = form.validate(FormValidateOptions::default()).unwrap();
    assert_eq!(validity.failures().len(), 1);
}

#[test]
fn the_first_invalid_field_is_focused() {
    let doc = Arc::new(Document::new());
    doc.append(text("ok").with_value("x"));
    let first = doc.append(text("a").with_attr("required", ""));
    let second = doc.append(text("b").with_attr("required", ""));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();

    assert!(form.validate(FormValidateOptions::default()).unwrap().is_invalid());
    assert!(first.is_focused());
    assert!(!second.is_focused());
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn form_events_wrap_field_events() {
    let doc = Arc::new(Document::new());
    let name = doc.append(text("name").with_value("bob"));
    let engine = engine();
    let mut form = engine.bind_form(doc, OptionLayer::new()).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::Validate, EventKind::Success, EventKind::Error, EventKind::Validated] {
        let log = Arc::clone(&log);
        engine.bus().subscribe(kind, move |event| {
            let scope = match event.origin() {
                Origin::Form => "form",
                Origin::Field(_) => "field",
            };
            log.lock().push(format!("{scope}:{}", event.kind()));
            Propagation::Continue
        });
    }
    form.validate(FormValidateOptions::default()).unwrap();
    assert_eq!(
        *log.lock(),
        vec![
            format!("form:{}", EventKind::Validate),
            format!("field:{}", EventKind::Validate),
            format!("field:{}", EventKind::Success),
            format!("field:{}", EventKind::Validated),
            format!("form:{}", EventKind::Success),
            format!("form:{}", EventKind::Validated),
        ]
    );
    assert_eq!(form.field(&FieldKey::Control(name.id())).map(|f| f.validity().is_valid()), Some(true));
}

#[test]
fn a_validate_listener_can_invalidate_the_form() {
    let doc = Arc::new(Document::new());
    doc.append(text("name").with_value("bob"));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();
    form.bus().subscribe(EventKind::Validate, |event| {
        if *event.origin() == Origin::Form {
            event.invalidate();
        }
        Propagation::Continue
    });

    let validity = form.validate(FormValidateOptions::default()).unwrap();
    assert_eq!(validity, Validity::Invalid(Vec::new()));
}

#[test]
fn polling_a_form_with_unsettled_checks_reports_pending() {
    let engine = engine();
    let (_release, gate) = oneshot::channel::<()>();
    let gate = gate.shared();
    engine.registry().add_validator(Validator::new("never", RequirementKind::String).string(move |_, _, _| {
        let gate = gate.clone();
        Check::Deferred(async move { gate.await.map_err(|_| Rejection::new()) }.boxed())
    }));
    let doc = Arc::new(Document::new());
    doc.append(text("name").with_value("bob").with_attr("data-parsley-never", ""));
    let mut form = engine.bind_form(doc, OptionLayer::new()).unwrap();

    assert_eq!(form.validate(FormValidateOptions::default()).unwrap(), Validity::Pending);
    assert_eq!(form.validity(), &Validity::Pending);
}

#[test]
fn configuration_errors_surface_before_any_field_event() {
    let engine = engine();
    engine
        .registry()
        .add_validator(Validator::new("word", RequirementKind::String).string(|_, _, _| Check::Ready(true)));
    let doc = Arc::new(Document::new());
    doc.append(text("name").with_value("x"));
    doc.append(
        Element::input("checkbox")
            .with_attr("name", "opts")
            .with_attr("value", "a")
            .with_attr("data-parsley-word", "")
            .with_checked(true),
    );
    let mut form = engine.bind_form(doc, OptionLayer::new()).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::Validate, EventKind::Success, EventKind::Error, EventKind::Validated] {
        let log = Arc::clone(&log);
        engine.bus().subscribe(kind, move |event| {
            let scope = match event.origin() {
                Origin::Form => "form",
                Origin::Field(_) => "field",
            };
            log.lock().push(format!("{scope}:{}", event.kind()));
            Propagation::Continue
        });
    }

    let error = form.validate(FormValidateOptions::default()).unwrap_err();
    assert!(matches!(error, ConfigError::MultipleUnsupported(ref name) if name == "word"));
    assert_eq!(
        *log.lock(),
        vec![format!("form:{}", EventKind::Validate), format!("form:{}", EventKind::Validated)]
    );
}

#[test]
fn reset_and_destroy_reach_every_field() {
    let doc = Arc::new(Document::new());
    doc.append(text("a").with_attr("required", ""));
    doc.append(text("b").with_attr("required", ""));
    let engine = engine();
    let mut form = engine.bind_form(doc, OptionLayer::new()).unwrap();
    let resets = count(engine.bus(), EventKind::Reset);
    let destroys = count(engine.bus(), EventKind::Destroy);

    form.validate(FormValidateOptions::default()).unwrap();
    form.reset();
    assert!(form.fields().iter().all(|f| f.validity().is_valid()));
    assert_eq!(resets.load(Ordering::SeqCst), 3);

    form.destroy();
    assert_eq!(destroys.load(Ordering::SeqCst), 3);
}

// ============================================================================
// SUBMIT INTERCEPTION
// ============================================================================

#[test]
fn valid_submits_proceed_and_emit_submit() {
    let doc = Arc::new(Document::new());
    doc.append(text("name").with_attr("required", "").with_value("bob"));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();
    let submits = count(form.bus(), EventKind::Submit);

    let mut event = SubmitEvent::native(None);
    let interception = form.intercept_submit(&mut event).unwrap();
    assert!(matches!(interception, Interception::Proceed));
    assert!(!event.is_default_prevented());
    assert_eq!(submits.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_submits_are_prevented() {
    let doc = Arc::new(Document::new());
    let name = doc.append(text("name").with_attr("required", ""));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();
    let submits = count(form.bus(), EventKind::Submit);

    let mut event = SubmitEvent::native(None);
    let interception = form.intercept_submit(&mut event).unwrap();
    assert!(matches!(interception, Interception::Prevented));
    assert!(event.is_default_prevented());
    assert!(name.is_focused());
    assert_eq!(submits.load(Ordering::SeqCst), 0);
}

#[test]
fn a_cancelled_submit_event_vetoes_the_submit() {
    let doc = Arc::new(Document::new());
    doc.append(text("name").with_value("bob"));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();
    form.bus().subscribe(EventKind::Submit, |_| Propagation::Cancel);

    let mut event = SubmitEvent::native(None);
    let interception = form.intercept_submit(&mut event).unwrap();
    assert!(matches!(interception, Interception::Prevented));
    assert!(event.is_default_prevented());
}

#[test]
fn formnovalidate_and_synthetic_submits_skip_validation() {
    let doc = Arc::new(Document::new());
    doc.append(text("name").with_attr("required", ""));
    let skip = doc.append(Element::input("submit").with_attr("formnovalidate", ""));
    let mut form = engine().bind_form(doc, OptionLayer::new()).unwrap();
    let validations = count(form.bus(), EventKind::Validate);

    let mut native = SubmitEvent::native(Some(skip.handle()));
    assert!(matches!(form.intercept_submit(&mut native).unwrap(), Interception::Proceed));

    let mut synthetic = SubmitEvent::synthetic();
    assert!(matches!(form.intercept_submit(&mut synthetic).unwrap(), Interception::Proceed));

    form.set_submit_source(skip.handle());
    let mut remembered = SubmitEvent::native(None);
    assert!(matches!(form.intercept_submit(&mut remembered).unwrap(), Interception::Proceed));

    assert_eq!(validations.load(Ordering::SeqCst), 0);
    assert!(!native.is_default_prevented());
}

#[test]
fn each_submit_starts_with_a_fresh_remote_cache() {
    let transport = Arc::new(Answering::default());
    let engine = Engine::builder().transport(transport.clone()).build();
    let doc = Arc::new(Document::new());
    doc.append(
        text("user")
            .with_value("bob")
            .with_attr("data-parsley-remote", "https://api.test/available"),
    );
    let mut form = engine.bind_form(doc, OptionLayer::new()).unwrap();

    assert!(form.validate(FormValidateOptions::default()).unwrap().is_valid());
    assert!(form.validate(FormValidateOptions::default()).unwrap().is_valid());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    let mut event = SubmitEvent::native(None);
    assert!(matches!(form.intercept_submit(&mut event).unwrap(), Interception::Proceed));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pending_submits_replay_with_the_clicked_button() {
    let (release, transport) = Gated::new();
    let engine = Engine::builder().transport(transport.clone()).build();
    let doc = Arc::new(Document::new());
    doc.append(
        text("user")
            .with_value("bob")
            .with_attr("data-parsley-remote", "https://api.test/available"),
    );
    let save = doc.append(
        Element::input("submit")
            .with_attr("name", "action")
            .with_attr("value", "save"),
    );
    let mut form = engine.bind_form(doc, OptionLayer::new()).unwrap();
    let submits = count(form.bus(), EventKind::Submit);

    let mut event = SubmitEvent::native(Some(save.handle()));
    let Interception::Deferred(replay) = form.intercept_submit(&mut event).unwrap() else {
        panic!("remote check should still be in flight");
    };
    assert!(event.is_default_prevented());
    assert_eq!(submits.load(Ordering::SeqCst), 0);

    release.send(200).unwrap();
    let replay = replay.await.expect("validation passed");
    assert!(replay.event.is_synthetic());
    assert_eq!(replay.button, Some(("action".to_owned(), "save".to_owned())));
    assert_eq!(submits.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    let mut again = replay.event;
    assert!(matches!(form.intercept_submit(&mut again).unwrap(), Interception::Proceed));
}

#[tokio::test]
async fn pending_submits_are_dropped_when_the_remote_check_fails() {
    let (release, transport) = Gated::new();
    let engine = Engine::builder().transport(transport).build();
    let doc = Arc::new(Document::new());
    doc.append(
        text("user")
            .with_value("taken")
            .with_attr("data-parsley-remote", "https://api.test/available"),
    );
    let mut form = engine.bind_form(doc, OptionLayer::new()).unwrap();
    let errors = count(form.bus(), EventKind::Error);

    let mut event = SubmitEvent::native(None);
    let Interception::Deferred(replay) = form.intercept_submit(&mut event).unwrap() else {
        panic!("remote check should still be in flight");
    };
    release.send(404).unwrap();
    assert!(replay.await.is_none());
    assert!(form.validity().is_invalid());
    assert!(errors.load(Ordering::SeqCst) >= 1);
}
