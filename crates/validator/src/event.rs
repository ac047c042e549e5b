//! Lifecycle events.
//!
//! Each field, each form and the engine own an [`EventBus`]. An event is
//! delivered to the emitting scope first, then to its parent scopes (form,
//! then engine). Any listener may return [`Propagation::Cancel`] to stop
//! delivery; cancelling a `Submit` event vetoes the submission. Cancelling
//! never changes a validation outcome: use [`Event::invalidate`] on a form
//! `Validate` event for that.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::field::FieldKey;
use crate::value::FieldValue;

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A field or form was bound.
    Init,
    /// Validation is about to run.
    Validate,
    /// Validation passed.
    Success,
    /// Validation failed.
    Error,
    /// Validation settled, whatever the outcome.
    Validated,
    /// The result was discarded.
    Reset,
    /// The instance was destroyed.
    Destroy,
    /// A validated form is about to submit.
    Submit,
}

impl EventKind {
    /// `field:validate`-style name, scoped by origin.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Validate => "validate",
            Self::Success => "success",
            Self::Error => "error",
            Self::Validated => "validated",
            Self::Reset => "reset",
            Self::Destroy => "destroy",
            Self::Submit => "submit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who emitted an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A field.
    Field(FieldKey),
    /// A form.
    Form,
}

/// Listener verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Keep delivering.
    #[default]
    Continue,
    /// Stop delivering to later listeners and parent scopes.
    Cancel,
}

/// An event in flight.
pub struct Event<'a> {
    kind: EventKind,
    origin: Origin,
    value: Option<&'a mut FieldValue>,
    invalidated: bool,
}

impl<'a> Event<'a> {
    /// Creates an event.
    pub fn new(kind: EventKind, origin: Origin) -> Self {
        Self {
            kind,
            origin,
            value: None,
            invalidated: false,
        }
    }

    /// Attaches the value snapshot listeners may rewrite.
    #[must_use]
    pub fn with_value(mut self, value: &'a mut FieldValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Event kind.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Emitting scope.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Snapshot of the value being validated (field `Validate` events).
    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_deref()
    }

    /// Mutable snapshot; changes are what gets validated.
    pub fn value_mut(&mut self) -> Option<&mut FieldValue> {
        self.value.as_deref_mut()
    }

    /// Forces a form validation to fail regardless of its fields.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Whether a listener invalidated the run.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("value", &self.value)
            .field("invalidated", &self.invalidated)
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&mut Event<'_>) -> Propagation + Send + Sync>;

/// Listeners of one scope.
#[derive(Default)]
pub struct EventBus {
    next: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, EventKind, Listener)>>,
}

impl EventBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&mut Event<'_>) -> Propagation + Send + Sync + 'static,
    {
        let id = ListenerId(self.next.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, kind, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` when it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(other, _, _)| *other != id);
        listeners.len() != before
    }

    /// Drops every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// `true` when nothing is listening.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Delivers to this bus only, in subscription order.
    pub fn emit(&self, event: &mut Event<'_>) -> Propagation {
        // Snapshot so listeners may subscribe without deadlocking.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            if listener(event) == Propagation::Cancel {
                return Propagation::Cancel;
            }
        }
        Propagation::Continue
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.len()).finish()
    }
}

/// Delivers along a chain of scopes, innermost first.
pub fn emit_chain<'b>(chain: impl IntoIterator<Item = &'b EventBus>, event: &mut Event<'_>) -> Propagation {
    for bus in chain {
        if bus.emit(event) == Propagation::Cancel {
            tracing::trace!(event = %event.kind, "event propagation cancelled");
            return Propagation::Cancel;
        }
    }
    Propagation::Continue
}
